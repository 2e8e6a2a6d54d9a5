//! Campaign Administration

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use thiserror::Error;
use tracing::{Span, info};

use crate::{
    campaigns::{
        Campaign, CampaignTransition, CampaignUpdate, NewCampaign,
        errors::{CampaignError, ValidationError},
    },
    ids::{CampaignUuid, RuleUuid},
    rules::{DiscountRule, NewDiscountRule, targeting::RuleTarget},
    store::{CampaignStore, StoreError, UnitOfWork},
};

/// Errors from campaign administration.
#[derive(Debug, Error)]
pub enum CampaignsServiceError {
    /// No such campaign, or it has been deleted.
    #[error("campaign {0} not found")]
    NotFound(CampaignUuid),

    /// Invalid campaign details.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The campaign refused the change.
    #[error(transparent)]
    Campaign(#[from] CampaignError),

    /// Persistence failed; nothing was written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates, edits and moves campaigns through their lifecycle.
#[automock]
#[async_trait]
pub trait CampaignsService: Send + Sync {
    /// Create a `Draft` campaign.
    async fn create_campaign(&self, campaign: NewCampaign)
    -> Result<Campaign, CampaignsServiceError>;

    /// A campaign that has not been deleted.
    async fn get_campaign(&self, uuid: CampaignUuid) -> Result<Campaign, CampaignsServiceError>;

    /// Replace the details of a `Draft` or `Scheduled` campaign.
    async fn update_campaign(
        &self,
        uuid: CampaignUuid,
        update: CampaignUpdate,
    ) -> Result<Campaign, CampaignsServiceError>;

    /// Attach a rule to a `Draft` campaign.
    async fn add_rule(
        &self,
        uuid: CampaignUuid,
        rule: NewDiscountRule,
    ) -> Result<DiscountRule, CampaignsServiceError>;

    /// Detach a rule from a `Draft` campaign.
    async fn remove_rule(
        &self,
        uuid: CampaignUuid,
        rule: RuleUuid,
    ) -> Result<DiscountRule, CampaignsServiceError>;

    /// Add a target to a rule of a `Draft` campaign.
    async fn add_rule_target(
        &self,
        uuid: CampaignUuid,
        rule: RuleUuid,
        target: RuleTarget,
    ) -> Result<(), CampaignsServiceError>;

    /// Apply a lifecycle transition.
    async fn transition(
        &self,
        uuid: CampaignUuid,
        transition: CampaignTransition,
    ) -> Result<Campaign, CampaignsServiceError>;

    /// Soft-delete a campaign.
    async fn delete_campaign(
        &self,
        uuid: CampaignUuid,
        now: Timestamp,
    ) -> Result<(), CampaignsServiceError>;
}

/// [`CampaignsService`] over a [`CampaignStore`].
#[derive(Clone)]
pub struct StoreCampaignsService {
    store: Arc<dyn CampaignStore>,
}

impl StoreCampaignsService {
    /// Create an administration service.
    #[must_use]
    pub fn new(store: Arc<dyn CampaignStore>) -> Self {
        Self { store }
    }

    /// Load a live campaign, change it, and write it back in one unit of
    /// work. Nothing is written if `change` fails.
    async fn modify<T, F>(
        &self,
        uuid: CampaignUuid,
        change: F,
    ) -> Result<(Campaign, T), CampaignsServiceError>
    where
        F: FnOnce(&mut Campaign) -> Result<T, CampaignsServiceError> + Send,
        T: Send,
    {
        let mut tx = self.store.begin().await?;

        let mut campaign = load(tx.as_mut(), uuid).await?;
        let value = change(&mut campaign)?;

        tx.update_campaign(campaign.clone()).await?;
        tx.commit().await?;

        Ok((campaign, value))
    }
}

impl fmt::Debug for StoreCampaignsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCampaignsService").finish_non_exhaustive()
    }
}

async fn load(
    tx: &mut dyn UnitOfWork,
    uuid: CampaignUuid,
) -> Result<Campaign, CampaignsServiceError> {
    tx.get_campaign(uuid)
        .await?
        .filter(|campaign| !campaign.is_deleted())
        .ok_or(CampaignsServiceError::NotFound(uuid))
}

#[async_trait]
impl CampaignsService for StoreCampaignsService {
    #[tracing::instrument(
        name = "campaigns.service.create_campaign",
        skip(self, campaign),
        fields(campaign_uuid = tracing::field::Empty, currency = %campaign.currency.iso_alpha_code),
        err
    )]
    async fn create_campaign(
        &self,
        campaign: NewCampaign,
    ) -> Result<Campaign, CampaignsServiceError> {
        let campaign = Campaign::new(campaign)?;

        Span::current().record("campaign_uuid", tracing::field::display(campaign.uuid()));

        let mut tx = self.store.begin().await?;

        tx.insert_campaign(campaign.clone()).await?;
        tx.commit().await?;

        info!(campaign_uuid = %campaign.uuid(), name = campaign.name(), "created campaign");

        Ok(campaign)
    }

    #[tracing::instrument(
        name = "campaigns.service.get_campaign",
        skip(self),
        fields(campaign_uuid = %uuid),
        err
    )]
    async fn get_campaign(&self, uuid: CampaignUuid) -> Result<Campaign, CampaignsServiceError> {
        self.store
            .get_campaign(uuid)
            .await?
            .filter(|campaign| !campaign.is_deleted())
            .ok_or(CampaignsServiceError::NotFound(uuid))
    }

    #[tracing::instrument(
        name = "campaigns.service.update_campaign",
        skip(self, update),
        fields(campaign_uuid = %uuid),
        err
    )]
    async fn update_campaign(
        &self,
        uuid: CampaignUuid,
        update: CampaignUpdate,
    ) -> Result<Campaign, CampaignsServiceError> {
        let (campaign, ()) = self
            .modify(uuid, |campaign| Ok(campaign.update(update)?))
            .await?;

        info!(campaign_uuid = %uuid, "updated campaign");

        Ok(campaign)
    }

    #[tracing::instrument(
        name = "campaigns.service.add_rule",
        skip(self, rule),
        fields(campaign_uuid = %uuid, rule_uuid = tracing::field::Empty),
        err
    )]
    async fn add_rule(
        &self,
        uuid: CampaignUuid,
        rule: NewDiscountRule,
    ) -> Result<DiscountRule, CampaignsServiceError> {
        let (campaign, rule_uuid) = self
            .modify(uuid, |campaign| Ok(campaign.add_rule(rule)?))
            .await?;

        Span::current().record("rule_uuid", tracing::field::display(rule_uuid));

        let rule = campaign
            .rule(rule_uuid)
            .cloned()
            .ok_or(CampaignError::RuleNotFound(rule_uuid))?;

        info!(campaign_uuid = %uuid, rule_uuid = %rule_uuid, "added discount rule");

        Ok(rule)
    }

    #[tracing::instrument(
        name = "campaigns.service.remove_rule",
        skip(self),
        fields(campaign_uuid = %uuid, rule_uuid = %rule),
        err
    )]
    async fn remove_rule(
        &self,
        uuid: CampaignUuid,
        rule: RuleUuid,
    ) -> Result<DiscountRule, CampaignsServiceError> {
        let (_, removed) = self
            .modify(uuid, |campaign| Ok(campaign.remove_rule(rule)?))
            .await?;

        info!(campaign_uuid = %uuid, rule_uuid = %rule, "removed discount rule");

        Ok(removed)
    }

    #[tracing::instrument(
        name = "campaigns.service.add_rule_target",
        skip(self, target),
        fields(campaign_uuid = %uuid, rule_uuid = %rule, dimension = %target.dimension()),
        err
    )]
    async fn add_rule_target(
        &self,
        uuid: CampaignUuid,
        rule: RuleUuid,
        target: RuleTarget,
    ) -> Result<(), CampaignsServiceError> {
        self.modify(uuid, |campaign| Ok(campaign.add_rule_target(rule, target)?))
            .await?;

        Ok(())
    }

    #[tracing::instrument(
        name = "campaigns.service.transition",
        skip(self),
        fields(campaign_uuid = %uuid, status = tracing::field::Empty),
        err
    )]
    async fn transition(
        &self,
        uuid: CampaignUuid,
        transition: CampaignTransition,
    ) -> Result<Campaign, CampaignsServiceError> {
        let (campaign, ()) = self
            .modify(uuid, |campaign| Ok(campaign.apply(transition)?))
            .await?;

        Span::current().record("status", tracing::field::display(campaign.status()));

        info!(campaign_uuid = %uuid, status = %campaign.status(), "campaign status changed");

        Ok(campaign)
    }

    #[tracing::instrument(
        name = "campaigns.service.delete_campaign",
        skip(self),
        fields(campaign_uuid = %uuid),
        err
    )]
    async fn delete_campaign(
        &self,
        uuid: CampaignUuid,
        now: Timestamp,
    ) -> Result<(), CampaignsServiceError> {
        self.modify(uuid, |campaign| {
            campaign.delete(now);

            Ok(())
        })
        .await?;

        info!(campaign_uuid = %uuid, "deleted campaign");

        Ok(())
    }
}
