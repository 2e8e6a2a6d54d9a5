//! In-Memory Campaign Store
//!
//! Campaigns and usages live in slot maps keyed by generated keys, with id
//! and relationship indexes on the side. A unit of work holds the store lock
//! for its whole lifetime, so writers are serialised and a commit is never
//! interleaved with another.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    campaigns::{Campaign, CampaignStatus, budget::CustomerUsageAggregate},
    ids::{CampaignUuid, CustomerUuid, OrderUuid, UsageUuid},
    store::{CampaignStore, StoreError, UnitOfWork},
    usage::CampaignUsage,
};

new_key_type! {
    /// Campaign slot key
    struct CampaignKey;
}

new_key_type! {
    /// Usage slot key
    struct UsageKey;
}

type UsageKeys = SmallVec<[UsageKey; 4]>;

#[derive(Debug, Default)]
struct StoreState {
    campaigns: SlotMap<CampaignKey, Campaign>,
    campaign_keys: FxHashMap<CampaignUuid, CampaignKey>,
    active: FxHashSet<CampaignKey>,
    usages: SlotMap<UsageKey, CampaignUsage>,
    usage_keys: FxHashMap<UsageUuid, UsageKey>,
    usages_by_order: FxHashMap<OrderUuid, UsageKeys>,
    usages_by_customer: FxHashMap<(CampaignUuid, CustomerUuid), UsageKeys>,
}

impl StoreState {
    fn campaign(&self, uuid: CampaignUuid) -> Option<&Campaign> {
        self.campaign_keys
            .get(&uuid)
            .and_then(|key| self.campaigns.get(*key))
    }

    fn has_usage(&self, uuid: UsageUuid) -> bool {
        self.usage_keys.contains_key(&uuid)
    }

    fn applicable_campaigns(&self, now: Timestamp) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self
            .active
            .iter()
            .filter_map(|key| self.campaigns.get(*key))
            .filter(|campaign| campaign.is_applicable(now))
            .cloned()
            .collect();

        // v7 ids sort by creation, keeping selection order stable.
        campaigns.sort_by_key(Campaign::uuid);

        campaigns
    }

    fn usages_for_order(&self, order: OrderUuid) -> impl Iterator<Item = &CampaignUsage> {
        self.usages_by_order
            .get(&order)
            .into_iter()
            .flatten()
            .filter_map(|key| self.usages.get(*key))
    }

    fn usages_for_customer(
        &self,
        campaign: CampaignUuid,
        customer: CustomerUuid,
    ) -> impl Iterator<Item = &CampaignUsage> {
        self.usages_by_customer
            .get(&(campaign, customer))
            .into_iter()
            .flatten()
            .filter_map(|key| self.usages.get(*key))
    }

    fn put_campaign(&mut self, campaign: Campaign) {
        let uuid = campaign.uuid();
        let active = campaign.status() == CampaignStatus::Active && !campaign.is_deleted();

        let key = match self.campaign_keys.get(&uuid).copied() {
            Some(key) => {
                if let Some(slot) = self.campaigns.get_mut(key) {
                    *slot = campaign;
                }

                key
            }
            None => {
                let key = self.campaigns.insert(campaign);
                self.campaign_keys.insert(uuid, key);

                key
            }
        };

        if active {
            self.active.insert(key);
        } else {
            self.active.remove(&key);
        }
    }

    fn put_usage(&mut self, usage: CampaignUsage) {
        if let Some(key) = self.usage_keys.get(&usage.uuid()).copied() {
            if let Some(slot) = self.usages.get_mut(key) {
                *slot = usage;
            }

            return;
        }

        let uuid = usage.uuid();
        let order = usage.order();
        let owner = (usage.campaign(), usage.customer());

        let key = self.usages.insert(usage);

        self.usage_keys.insert(uuid, key);
        self.usages_by_order.entry(order).or_default().push(key);
        self.usages_by_customer.entry(owner).or_default().push(key);
    }
}

fn aggregate<'a>(usages: impl Iterator<Item = &'a CampaignUsage>) -> CustomerUsageAggregate {
    usages
        .filter(|usage| !usage.is_reversed())
        .fold(CustomerUsageAggregate::none(), |mut aggregate, usage| {
            aggregate.usage_count += 1;
            aggregate.total_discount += usage.discount_amount().amount();
            aggregate
        })
}

/// Campaign store backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCampaignStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryCampaignStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn find_applicable_campaigns(
        &self,
        now: Timestamp,
    ) -> Result<Vec<Campaign>, StoreError> {
        Ok(self.state.lock().await.applicable_campaigns(now))
    }

    async fn find_customer_usage_aggregate(
        &self,
        campaign: CampaignUuid,
        customer: CustomerUuid,
    ) -> Result<CustomerUsageAggregate, StoreError> {
        let state = self.state.lock().await;

        Ok(aggregate(state.usages_for_customer(campaign, customer)))
    }

    async fn find_usages_by_order(
        &self,
        order: OrderUuid,
    ) -> Result<Vec<CampaignUsage>, StoreError> {
        let state = self.state.lock().await;

        Ok(state.usages_for_order(order).cloned().collect())
    }

    async fn get_campaign(&self, uuid: CampaignUuid) -> Result<Option<Campaign>, StoreError> {
        Ok(self.state.lock().await.campaign(uuid).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let state = Arc::clone(&self.state).lock_owned().await;

        Ok(Box::new(InMemoryUnitOfWork {
            state,
            campaigns: FxHashMap::default(),
            usages: Vec::new(),
        }))
    }
}

/// Unit of work over an [`InMemoryCampaignStore`].
///
/// Writes are staged beside the locked state and copied in on commit.
#[derive(Debug)]
struct InMemoryUnitOfWork {
    state: OwnedMutexGuard<StoreState>,
    campaigns: FxHashMap<CampaignUuid, Campaign>,
    usages: Vec<CampaignUsage>,
}

impl InMemoryUnitOfWork {
    fn has_campaign(&self, uuid: CampaignUuid) -> bool {
        self.campaigns.contains_key(&uuid) || self.state.campaign(uuid).is_some()
    }

    fn staged_usage(&self, uuid: UsageUuid) -> Option<&CampaignUsage> {
        self.usages.iter().find(|usage| usage.uuid() == uuid)
    }

    fn has_usage(&self, uuid: UsageUuid) -> bool {
        self.staged_usage(uuid).is_some() || self.state.has_usage(uuid)
    }

    /// Committed usages overlaid with staged edits, followed by staged
    /// inserts, restricted to those matching `filter`.
    fn merged_usages<'a>(
        &'a self,
        committed: impl Iterator<Item = &'a CampaignUsage>,
        filter: impl Fn(&CampaignUsage) -> bool,
    ) -> Vec<&'a CampaignUsage> {
        let mut merged: Vec<&CampaignUsage> = committed
            .map(|usage| self.staged_usage(usage.uuid()).unwrap_or(usage))
            .collect();

        merged.extend(
            self.usages
                .iter()
                .filter(|usage| !self.state.has_usage(usage.uuid()) && filter(usage)),
        );

        merged
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn get_campaign(&mut self, uuid: CampaignUuid) -> Result<Option<Campaign>, StoreError> {
        Ok(self
            .campaigns
            .get(&uuid)
            .or_else(|| self.state.campaign(uuid))
            .cloned())
    }

    async fn insert_campaign(&mut self, campaign: Campaign) -> Result<(), StoreError> {
        let uuid = campaign.uuid();

        if self.has_campaign(uuid) {
            return Err(StoreError::Conflict(format!("campaign {uuid}")));
        }

        self.campaigns.insert(uuid, campaign);

        Ok(())
    }

    async fn update_campaign(&mut self, campaign: Campaign) -> Result<(), StoreError> {
        let uuid = campaign.uuid();

        if !self.has_campaign(uuid) {
            return Err(StoreError::Missing(format!("campaign {uuid}")));
        }

        self.campaigns.insert(uuid, campaign);

        Ok(())
    }

    async fn customer_usage_aggregate(
        &mut self,
        campaign: CampaignUuid,
        customer: CustomerUuid,
    ) -> Result<CustomerUsageAggregate, StoreError> {
        let usages = self.merged_usages(
            self.state.usages_for_customer(campaign, customer),
            |usage| usage.campaign() == campaign && usage.customer() == customer,
        );

        Ok(aggregate(usages.into_iter()))
    }

    async fn find_usages_by_order(
        &mut self,
        order: OrderUuid,
    ) -> Result<Vec<CampaignUsage>, StoreError> {
        let usages = self.merged_usages(self.state.usages_for_order(order), |usage| {
            usage.order() == order
        });

        Ok(usages.into_iter().cloned().collect())
    }

    async fn insert_usage(&mut self, usage: CampaignUsage) -> Result<(), StoreError> {
        let uuid = usage.uuid();

        if self.has_usage(uuid) {
            return Err(StoreError::Conflict(format!("usage {uuid}")));
        }

        self.usages.push(usage);

        Ok(())
    }

    async fn update_usage(&mut self, usage: CampaignUsage) -> Result<(), StoreError> {
        let uuid = usage.uuid();

        if let Some(staged) = self.usages.iter_mut().find(|staged| staged.uuid() == uuid) {
            *staged = usage;

            return Ok(());
        }

        if !self.state.has_usage(uuid) {
            return Err(StoreError::Missing(format!("usage {uuid}")));
        }

        self.usages.push(usage);

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        for (_, campaign) in self.campaigns.drain() {
            self.state.put_campaign(campaign);
        }

        for usage in self.usages.drain(..) {
            self.state.put_usage(usage);
        }

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.campaigns.clear();
        self.usages.clear();

        Ok(())
    }
}
