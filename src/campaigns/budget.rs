//! Campaign Budget Constraints

use rust_decimal::Decimal;
use rusty_money::iso::Currency;

use crate::{campaigns::errors::ValidationError, money::Money};

/// Budget and usage limits for a campaign. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignBudget {
    /// Maximum cumulative discount across all customers.
    pub total_budget_limit: Option<Money>,

    /// Maximum number of usages across all customers.
    pub total_usage_limit: Option<u64>,

    /// Maximum cumulative discount for a single customer.
    pub per_customer_budget_limit: Option<Money>,

    /// Maximum number of usages for a single customer.
    pub per_customer_usage_limit: Option<u64>,
}

impl CampaignBudget {
    /// Create a budget with no constraints
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            total_budget_limit: None,
            total_usage_limit: None,
            per_customer_budget_limit: None,
            per_customer_usage_limit: None,
        }
    }

    /// Cap the total discount.
    #[must_use]
    pub fn with_total_budget_limit(mut self, limit: Money) -> Self {
        self.total_budget_limit = Some(limit);
        self
    }

    /// Cap the total number of usages.
    #[must_use]
    pub fn with_total_usage_limit(mut self, limit: u64) -> Self {
        self.total_usage_limit = Some(limit);
        self
    }

    /// Cap the discount per customer.
    #[must_use]
    pub fn with_per_customer_budget_limit(mut self, limit: Money) -> Self {
        self.per_customer_budget_limit = Some(limit);
        self
    }

    /// Cap the number of usages per customer.
    #[must_use]
    pub fn with_per_customer_usage_limit(mut self, limit: u64) -> Self {
        self.per_customer_usage_limit = Some(limit);
        self
    }

    /// Check if this budget has any constraints
    #[must_use]
    pub const fn has_constraints(&self) -> bool {
        self.total_budget_limit.is_some()
            || self.total_usage_limit.is_some()
            || self.has_customer_constraints()
    }

    /// Check if this budget limits individual customers
    #[must_use]
    pub const fn has_customer_constraints(&self) -> bool {
        self.per_customer_budget_limit.is_some() || self.per_customer_usage_limit.is_some()
    }

    /// Ensure limits are positive and denominated in `currency`.
    pub(crate) fn validate(&self, currency: &'static Currency) -> Result<(), ValidationError> {
        let zero = Money::zero(currency);

        for (field, limit) in [
            ("total budget limit", self.total_budget_limit),
            ("per-customer budget limit", self.per_customer_budget_limit),
        ] {
            if let Some(limit) = limit
                && !zero.compare(&limit)?.is_lt()
            {
                return Err(ValidationError::NonPositiveLimit(field));
            }
        }

        for (field, limit) in [
            ("total usage limit", self.total_usage_limit),
            ("per-customer usage limit", self.per_customer_usage_limit),
        ] {
            if limit == Some(0) {
                return Err(ValidationError::NonPositiveLimit(field));
            }
        }

        Ok(())
    }
}

/// A customer's non-reversed usage of one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CustomerUsageAggregate {
    /// Number of non-reversed usages.
    pub usage_count: u64,

    /// Sum of their discounts, in the campaign currency.
    pub total_discount: Decimal,
}

impl CustomerUsageAggregate {
    /// No prior usage.
    pub const fn none() -> Self {
        Self {
            usage_count: 0,
            total_discount: Decimal::ZERO,
        }
    }
}
