//! Usage Recording
//!
//! Turns a quoted discount into a ledger entry and campaign totals, and
//! reverses them when an order is cancelled. Each operation runs in a single
//! unit of work: the ledger and the totals change together or not at all.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use thiserror::Error;
use tracing::{Span, info, warn};

use crate::{
    campaigns::ReversalOutcome,
    config::EngineConfig,
    ids::{CampaignUuid, CustomerUuid, OrderItemUuid, OrderUuid},
    money::{Money, MoneyError},
    selection::DiscountCandidate,
    store::{CampaignStore, StoreError, UnitOfWork},
    usage::CampaignUsage,
};

/// Errors from recording or reversing usage.
#[derive(Debug, Error)]
pub enum UsageServiceError {
    /// The campaign does not exist or has been deleted.
    #[error("campaign {0} not found")]
    CampaignNotFound(CampaignUuid),

    /// The discount to record is zero or negative.
    #[error("usage discount must be positive, got {0}")]
    NonPositiveAmount(Money),

    /// Committing would overrun a budget or usage limit.
    #[error("campaign {0} has no budget left for this usage")]
    BudgetExhausted(CampaignUuid),

    /// Persistence failed; nothing was written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Amount arithmetic failed, e.g. a currency mismatch.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl UsageServiceError {
    /// Whether retrying the surrounding order operation may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// One usage to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRequest {
    /// Campaign granting the discount.
    pub campaign: CampaignUuid,

    /// Customer receiving it.
    pub customer: CustomerUuid,

    /// Order it applies to.
    pub order: OrderUuid,

    /// Order item, when recorded per line.
    pub order_item: Option<OrderItemUuid>,

    /// Discount granted, in the campaign currency.
    pub discount_amount: Money,
}

impl UsageRequest {
    /// A usage for a quoted candidate.
    pub fn from_candidate(
        candidate: &DiscountCandidate,
        order: OrderUuid,
        order_item: Option<OrderItemUuid>,
    ) -> Self {
        Self {
            campaign: candidate.campaign,
            customer: candidate.customer,
            order,
            order_item,
            discount_amount: candidate.discount_amount,
        }
    }
}

/// Result of reversing an order's usages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReversalSummary {
    /// Usages reversed by this call.
    pub reversed: usize,

    /// Usages that were already reversed and left alone.
    pub already_reversed: usize,

    /// Reversals whose campaign totals hit the zero floor.
    pub clamped: usize,
}

/// Records and reverses campaign usage.
#[automock]
#[async_trait]
pub trait RecordingService: Send + Sync {
    /// Append a usage and add it to the campaign totals.
    async fn record_usage(
        &self,
        request: UsageRequest,
        now: Timestamp,
    ) -> Result<CampaignUsage, UsageServiceError>;

    /// Record a quoted candidate against an order.
    async fn commit(
        &self,
        candidate: &DiscountCandidate,
        order: OrderUuid,
        order_item: Option<OrderItemUuid>,
        now: Timestamp,
    ) -> Result<CampaignUsage, UsageServiceError>;

    /// Reverse every usage on an order. Safe to repeat.
    async fn reverse_usage_for_order(
        &self,
        order: OrderUuid,
        now: Timestamp,
    ) -> Result<ReversalSummary, UsageServiceError>;
}

/// [`RecordingService`] over a [`CampaignStore`].
#[derive(Clone)]
pub struct UsageRecordingService {
    store: Arc<dyn CampaignStore>,
    config: EngineConfig,
}

impl UsageRecordingService {
    /// Create a recording service.
    #[must_use]
    pub fn new(store: Arc<dyn CampaignStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    async fn record_in(
        &self,
        tx: &mut dyn UnitOfWork,
        request: &UsageRequest,
        now: Timestamp,
    ) -> Result<CampaignUsage, UsageServiceError> {
        let mut campaign = tx
            .get_campaign(request.campaign)
            .await?
            .filter(|campaign| !campaign.is_deleted())
            .ok_or(UsageServiceError::CampaignNotFound(request.campaign))?;

        if self.config.is_strict() {
            if !campaign.has_budget_for(request.discount_amount)? {
                return Err(UsageServiceError::BudgetExhausted(request.campaign));
            }

            if campaign.budget().has_customer_constraints() {
                let aggregate = tx
                    .customer_usage_aggregate(request.campaign, request.customer)
                    .await?;

                if !campaign.has_customer_budget_for(request.discount_amount, &aggregate)? {
                    return Err(UsageServiceError::BudgetExhausted(request.campaign));
                }
            }
        }

        campaign.record_usage(request.discount_amount)?;

        let usage = CampaignUsage::new(
            request.campaign,
            request.customer,
            request.order,
            request.order_item,
            request.discount_amount,
            now,
        );

        tx.insert_usage(usage.clone()).await?;
        tx.update_campaign(campaign).await?;

        Ok(usage)
    }

    async fn reverse_in(
        tx: &mut dyn UnitOfWork,
        order: OrderUuid,
        now: Timestamp,
    ) -> Result<ReversalSummary, UsageServiceError> {
        let mut summary = ReversalSummary::default();

        for mut usage in tx.find_usages_by_order(order).await? {
            if !usage.reverse(now) {
                summary.already_reversed += 1;

                continue;
            }

            let mut campaign = tx
                .get_campaign(usage.campaign())
                .await?
                .ok_or(UsageServiceError::CampaignNotFound(usage.campaign()))?;

            if campaign.reverse_usage(usage.discount_amount())? == ReversalOutcome::Clamped {
                warn!(
                    campaign_uuid = %campaign.uuid(),
                    usage_uuid = %usage.uuid(),
                    discount_amount = %usage.discount_amount(),
                    "reversal exceeded recorded totals; clamped at zero"
                );

                summary.clamped += 1;
            }

            tx.update_usage(usage).await?;
            tx.update_campaign(campaign).await?;

            summary.reversed += 1;
        }

        Ok(summary)
    }
}

impl fmt::Debug for UsageRecordingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsageRecordingService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Commit `result`'s unit of work if it succeeded, roll it back otherwise.
async fn finish<T>(
    mut tx: Box<dyn UnitOfWork>,
    result: Result<T, UsageServiceError>,
) -> Result<T, UsageServiceError> {
    match result {
        Ok(value) => {
            tx.commit().await?;

            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "rollback failed");
            }

            Err(error)
        }
    }
}

fn log_failure(error: &UsageServiceError) {
    if error.is_retryable() {
        warn!(error = %error, "usage persistence failed");
    }
}

#[async_trait]
impl RecordingService for UsageRecordingService {
    #[tracing::instrument(
        name = "recording.service.record_usage",
        skip(self, request),
        fields(
            campaign_uuid = %request.campaign,
            customer_uuid = %request.customer,
            order_uuid = %request.order,
            discount_amount = %request.discount_amount,
            usage_uuid = tracing::field::Empty
        ),
        err
    )]
    async fn record_usage(
        &self,
        request: UsageRequest,
        now: Timestamp,
    ) -> Result<CampaignUsage, UsageServiceError> {
        if !request.discount_amount.is_positive() {
            return Err(UsageServiceError::NonPositiveAmount(request.discount_amount));
        }

        let mut tx = self.store.begin().await.inspect_err(|error| {
            warn!(error = %error, "failed to begin unit of work");
        })?;

        let result = self.record_in(tx.as_mut(), &request, now).await;
        let usage = finish(tx, result).await.inspect_err(log_failure)?;

        Span::current().record("usage_uuid", tracing::field::display(usage.uuid()));

        info!(
            campaign_uuid = %usage.campaign(),
            usage_uuid = %usage.uuid(),
            "recorded campaign usage"
        );

        Ok(usage)
    }

    async fn commit(
        &self,
        candidate: &DiscountCandidate,
        order: OrderUuid,
        order_item: Option<OrderItemUuid>,
        now: Timestamp,
    ) -> Result<CampaignUsage, UsageServiceError> {
        self.record_usage(UsageRequest::from_candidate(candidate, order, order_item), now)
            .await
    }

    #[tracing::instrument(
        name = "recording.service.reverse_usage_for_order",
        skip(self, order),
        fields(
            order_uuid = %order,
            reversed = tracing::field::Empty,
            already_reversed = tracing::field::Empty
        ),
        err
    )]
    async fn reverse_usage_for_order(
        &self,
        order: OrderUuid,
        now: Timestamp,
    ) -> Result<ReversalSummary, UsageServiceError> {
        let mut tx = self.store.begin().await.inspect_err(|error| {
            warn!(error = %error, "failed to begin unit of work");
        })?;

        let result = Self::reverse_in(tx.as_mut(), order, now).await;
        let summary = finish(tx, result).await.inspect_err(log_failure)?;

        let span = Span::current();

        span.record("reversed", summary.reversed);
        span.record("already_reversed", summary.already_reversed);

        info!(order_uuid = %order, reversed = summary.reversed, "reversed order usage");

        Ok(summary)
    }
}
