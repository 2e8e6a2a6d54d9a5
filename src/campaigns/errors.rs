//! Campaign Errors

use jiff::Timestamp;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    campaigns::CampaignStatus,
    ids::RuleUuid,
    money::MoneyError,
    rules::targeting::TargetDimension,
};

/// Malformed input to a constructor or mutator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Campaign name is blank.
    #[error("campaign name must not be empty")]
    EmptyName,

    /// End date is not after the start date.
    #[error("campaign must end after it starts (start {starts_at}, end {ends_at})")]
    InvalidDateRange {
        /// Requested start.
        starts_at: Timestamp,

        /// Requested end.
        ends_at: Timestamp,
    },

    /// Discount value is zero or negative.
    #[error("discount value must be positive, got {0}")]
    NonPositiveDiscountValue(Decimal),

    /// Percentage discount above 100.
    #[error("percentage discount must not exceed 100, got {0}")]
    PercentageOutOfRange(Decimal),

    /// Maximum discount cap is zero or negative.
    #[error("maximum discount amount must be positive, got {0}")]
    NonPositiveMaxDiscount(Decimal),

    /// Minimum order amount below zero.
    #[error("minimum order amount must not be negative, got {0}")]
    NegativeMinOrderAmount(Decimal),

    /// Minimum quantity of zero.
    #[error("minimum quantity must be at least 1")]
    ZeroMinQuantity,

    /// A budget or usage limit that is zero or negative.
    #[error("{0} must be positive")]
    NonPositiveLimit(&'static str),

    /// A target was added to a dimension the rule does not select by.
    #[error("cannot add a {dimension} target to a rule targeting {configured}")]
    TargetMismatch {
        /// Dimension the caller tried to mutate.
        dimension: TargetDimension,

        /// Target type the rule is configured with.
        configured: &'static str,
    },

    /// A limit is denominated in a different currency.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Errors raised by the campaign aggregate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CampaignError {
    /// Invalid input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The operation is not allowed in the campaign's current status.
    #[error("cannot {operation} a {current} campaign; requires one of {required:?}")]
    InvalidOperation {
        /// Operation that was attempted.
        operation: &'static str,

        /// Status the campaign is in.
        current: CampaignStatus,

        /// Statuses the operation is allowed from.
        required: &'static [CampaignStatus],
    },

    /// Scheduling needs at least one rule.
    #[error("campaign has no discount rules")]
    NoRules,

    /// Rule is not part of the campaign.
    #[error("discount rule {0} not found")]
    RuleNotFound(RuleUuid),

    /// Money arithmetic failed.
    #[error(transparent)]
    Money(#[from] MoneyError),
}
