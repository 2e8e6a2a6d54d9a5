//! Campaign Store
//!
//! Persistence boundary of the engine. Reads used by quoting go straight to
//! the store; every write happens inside a [`UnitOfWork`] that is applied as
//! a whole on [`UnitOfWork::commit`] or not at all.

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use thiserror::Error;

use crate::{
    campaigns::{Campaign, budget::CustomerUsageAggregate},
    ids::{CampaignUuid, CustomerUuid, OrderUuid},
    usage::CampaignUsage,
};

pub mod memory;

pub use memory::InMemoryCampaignStore;

/// Persistence failures. All are recoverable from the engine's point of view.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same id already exists.
    #[error("{0} already exists")]
    Conflict(String),

    /// An update targeted a record that does not exist.
    #[error("{0} does not exist")]
    Missing(String),

    /// The backend failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Read access and unit-of-work factory.
#[automock]
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Campaigns that are active, not deleted, and inside their date window
    /// at `now`, with their rules.
    async fn find_applicable_campaigns(&self, now: Timestamp)
    -> Result<Vec<Campaign>, StoreError>;

    /// A customer's non-reversed usage of a campaign.
    async fn find_customer_usage_aggregate(
        &self,
        campaign: CampaignUuid,
        customer: CustomerUuid,
    ) -> Result<CustomerUsageAggregate, StoreError>;

    /// Every usage recorded against an order.
    async fn find_usages_by_order(&self, order: OrderUuid)
    -> Result<Vec<CampaignUsage>, StoreError>;

    /// A campaign by id, including soft-deleted ones.
    async fn get_campaign(&self, uuid: CampaignUuid) -> Result<Option<Campaign>, StoreError>;

    /// Start a unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

/// A set of reads and writes applied atomically.
///
/// Reads observe the unit's own pending writes. Dropping a unit without
/// committing discards its writes.
#[automock]
#[async_trait]
pub trait UnitOfWork: Send {
    /// A campaign by id, including soft-deleted ones.
    async fn get_campaign(&mut self, uuid: CampaignUuid) -> Result<Option<Campaign>, StoreError>;

    /// Stage a new campaign.
    async fn insert_campaign(&mut self, campaign: Campaign) -> Result<(), StoreError>;

    /// Stage a replacement for an existing campaign.
    async fn update_campaign(&mut self, campaign: Campaign) -> Result<(), StoreError>;

    /// A customer's non-reversed usage of a campaign.
    async fn customer_usage_aggregate(
        &mut self,
        campaign: CampaignUuid,
        customer: CustomerUuid,
    ) -> Result<CustomerUsageAggregate, StoreError>;

    /// Every usage recorded against an order.
    async fn find_usages_by_order(
        &mut self,
        order: OrderUuid,
    ) -> Result<Vec<CampaignUsage>, StoreError>;

    /// Stage a new usage.
    async fn insert_usage(&mut self, usage: CampaignUsage) -> Result<(), StoreError>;

    /// Stage a replacement for an existing usage.
    async fn update_usage(&mut self, usage: CampaignUsage) -> Result<(), StoreError>;

    /// Apply every staged write.
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every staged write.
    async fn rollback(&mut self) -> Result<(), StoreError>;
}
