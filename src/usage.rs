//! Campaign Usage Ledger
//!
//! Append-only record of one discount granted by a campaign to an order or
//! order item. Entries are never deleted; reversal marks them instead.

use jiff::Timestamp;

use crate::{
    ids::{CampaignUuid, CustomerUuid, OrderItemUuid, OrderUuid, UsageUuid},
    money::Money,
};

/// One application of a campaign's discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignUsage {
    uuid: UsageUuid,
    campaign: CampaignUuid,
    customer: CustomerUuid,
    order: OrderUuid,
    order_item: Option<OrderItemUuid>,
    discount_amount: Money,
    used_at: Timestamp,
    reversed_at: Option<Timestamp>,
}

impl CampaignUsage {
    /// Create a non-reversed usage.
    pub fn new(
        campaign: CampaignUuid,
        customer: CustomerUuid,
        order: OrderUuid,
        order_item: Option<OrderItemUuid>,
        discount_amount: Money,
        used_at: Timestamp,
    ) -> Self {
        Self {
            uuid: UsageUuid::new(),
            campaign,
            customer,
            order,
            order_item,
            discount_amount,
            used_at,
            reversed_at: None,
        }
    }

    /// Usage id.
    pub const fn uuid(&self) -> UsageUuid {
        self.uuid
    }

    /// Campaign that granted the discount.
    pub const fn campaign(&self) -> CampaignUuid {
        self.campaign
    }

    /// Customer who received it.
    pub const fn customer(&self) -> CustomerUuid {
        self.customer
    }

    /// Order it was applied to.
    pub const fn order(&self) -> OrderUuid {
        self.order
    }

    /// Order item it was applied to, if recorded per line.
    pub const fn order_item(&self) -> Option<OrderItemUuid> {
        self.order_item
    }

    /// Discount granted.
    pub const fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    /// When it was granted.
    pub const fn used_at(&self) -> Timestamp {
        self.used_at
    }

    /// When it was reversed.
    pub const fn reversed_at(&self) -> Option<Timestamp> {
        self.reversed_at
    }

    /// Whether it has been reversed.
    pub const fn is_reversed(&self) -> bool {
        self.reversed_at.is_some()
    }

    /// Mark as reversed. Returns `false`, changing nothing, if it already was.
    pub fn reverse(&mut self, now: Timestamp) -> bool {
        if self.is_reversed() {
            return false;
        }

        self.reversed_at = Some(now);

        true
    }
}
