//! Rebate
//!
//! Rebate is a campaign discount engine: time-boxed campaigns hold targeted
//! discount rules and budgets, order lines are quoted the single best
//! discount, and committed discounts are recorded (and reversed) against
//! campaign and per-customer limits.

pub mod admin;
pub mod campaigns;
pub mod config;
pub mod fixtures;
pub mod ids;
pub mod money;
pub mod observability;
pub mod prelude;
pub mod recording;
pub mod rules;
pub mod selection;
pub mod store;
pub mod usage;
