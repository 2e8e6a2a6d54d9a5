//! Campaigns
//!
//! A campaign groups discount rules under a status lifecycle, a priority, and
//! optional global and per-customer budgets.
//!
//! ```text
//! Draft ──► Scheduled ──► Active ⇄ Paused
//!                           │
//!                           ▼
//!                         Ended
//!
//! Draft | Scheduled | Active | Paused ──► Cancelled
//! ```

use std::fmt;

use jiff::Timestamp;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};

use crate::{
    campaigns::{
        budget::{CampaignBudget, CustomerUsageAggregate},
        errors::{CampaignError, ValidationError},
    },
    ids::{CampaignUuid, RuleUuid},
    money::{Money, MoneyError},
    rules::{DiscountRule, NewDiscountRule, targeting::RuleTarget},
};

pub mod budget;
pub mod errors;

/// Campaign lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Being configured; rules may change.
    Draft,

    /// Configured and waiting to go live.
    Scheduled,

    /// Live; eligible for selection within its date window.
    Active,

    /// Temporarily suspended.
    Paused,

    /// Finished after running.
    Ended,

    /// Abandoned.
    Cancelled,
}

impl CampaignStatus {
    /// Status name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DRAFT: &[CampaignStatus] = &[CampaignStatus::Draft];

const EDITABLE: &[CampaignStatus] = &[CampaignStatus::Draft, CampaignStatus::Scheduled];

const ACTIVATABLE: &[CampaignStatus] = &[CampaignStatus::Scheduled, CampaignStatus::Paused];

const PAUSABLE: &[CampaignStatus] = &[CampaignStatus::Scheduled, CampaignStatus::Active];

const ENDABLE: &[CampaignStatus] = &[CampaignStatus::Active];

const CANCELLABLE: &[CampaignStatus] = &[
    CampaignStatus::Draft,
    CampaignStatus::Scheduled,
    CampaignStatus::Active,
    CampaignStatus::Paused,
];

/// A lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignTransition {
    /// `Draft` to `Scheduled`.
    Schedule,

    /// `Scheduled` or `Paused` to `Active`.
    Activate,

    /// `Scheduled` or `Active` to `Paused`.
    Pause,

    /// `Active` to `Ended`.
    End,

    /// Any non-terminal status to `Cancelled`.
    Cancel,
}

/// Whether a reversal was fully applied or hit the zero floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversalOutcome {
    /// Totals were decremented by the full amount.
    Exact,

    /// The discount or usage total would have gone negative and was floored
    /// at zero.
    Clamped,
}

/// Input for a new campaign.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// First instant the campaign may apply.
    pub starts_at: Timestamp,

    /// Last instant the campaign may apply.
    pub ends_at: Timestamp,

    /// Tie-break priority; higher wins.
    pub priority: i32,

    /// Currency of every amount the campaign accumulates.
    pub currency: &'static Currency,

    /// Budget and usage limits.
    pub budget: CampaignBudget,
}

/// Replacement details for a `Draft` or `Scheduled` campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignUpdate {
    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// First instant the campaign may apply.
    pub starts_at: Timestamp,

    /// Last instant the campaign may apply.
    pub ends_at: Timestamp,

    /// Tie-break priority; higher wins.
    pub priority: i32,

    /// Budget and usage limits.
    pub budget: CampaignBudget,
}

/// A promotional campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    uuid: CampaignUuid,
    name: String,
    description: Option<String>,
    starts_at: Timestamp,
    ends_at: Timestamp,
    status: CampaignStatus,
    priority: i32,
    budget: CampaignBudget,
    total_discount_used: Money,
    total_usage_count: u64,
    rules: Vec<DiscountRule>,
    deleted_at: Option<Timestamp>,
}

impl Campaign {
    /// Validate and create a `Draft` campaign with zeroed totals.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a blank name, an end date not after
    /// the start date, or invalid limits.
    pub fn new(campaign: NewCampaign) -> Result<Self, ValidationError> {
        let name = validate_details(&campaign.name, campaign.starts_at, campaign.ends_at)?;

        campaign.budget.validate(campaign.currency)?;

        Ok(Self {
            uuid: CampaignUuid::new(),
            name,
            description: campaign.description,
            starts_at: campaign.starts_at,
            ends_at: campaign.ends_at,
            status: CampaignStatus::Draft,
            priority: campaign.priority,
            budget: campaign.budget,
            total_discount_used: Money::zero(campaign.currency),
            total_usage_count: 0,
            rules: Vec::new(),
            deleted_at: None,
        })
    }

    /// Campaign id.
    pub const fn uuid(&self) -> CampaignUuid {
        self.uuid
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Start of the date window.
    pub const fn starts_at(&self) -> Timestamp {
        self.starts_at
    }

    /// End of the date window.
    pub const fn ends_at(&self) -> Timestamp {
        self.ends_at
    }

    /// Lifecycle status.
    pub const fn status(&self) -> CampaignStatus {
        self.status
    }

    /// Tie-break priority.
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Budget and usage limits.
    pub const fn budget(&self) -> &CampaignBudget {
        &self.budget
    }

    /// Campaign currency.
    pub const fn currency(&self) -> &'static Currency {
        self.total_discount_used.currency()
    }

    /// Cumulative discount granted.
    pub const fn total_discount_used(&self) -> Money {
        self.total_discount_used
    }

    /// Number of recorded usages.
    pub const fn total_usage_count(&self) -> u64 {
        self.total_usage_count
    }

    /// Discount rules.
    pub fn rules(&self) -> &[DiscountRule] {
        &self.rules
    }

    /// A single rule.
    pub fn rule(&self, uuid: RuleUuid) -> Option<&DiscountRule> {
        self.rules.iter().find(|rule| rule.uuid() == uuid)
    }

    /// Soft-deletion instant.
    pub const fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }

    /// Whether the campaign has been soft-deleted.
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the campaign can grant discounts at `now`: active, not deleted,
    /// and inside its date window (inclusive on both ends).
    pub fn is_applicable(&self, now: Timestamp) -> bool {
        self.status == CampaignStatus::Active
            && !self.is_deleted()
            && self.starts_at <= now
            && now <= self.ends_at
    }

    /// Replace the campaign details.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] unless `Draft` or
    /// `Scheduled`, or a validation error for invalid details.
    pub fn update(&mut self, update: CampaignUpdate) -> Result<(), CampaignError> {
        self.ensure_status("update", EDITABLE)?;

        let name = validate_details(&update.name, update.starts_at, update.ends_at)?;

        update.budget.validate(self.currency())?;

        self.name = name;
        self.description = update.description;
        self.starts_at = update.starts_at;
        self.ends_at = update.ends_at;
        self.priority = update.priority;
        self.budget = update.budget;

        Ok(())
    }

    /// Validate and attach a new rule.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] unless `Draft`, or a
    /// validation error for the rule.
    pub fn add_rule(&mut self, rule: NewDiscountRule) -> Result<RuleUuid, CampaignError> {
        self.ensure_status("add a rule to", DRAFT)?;

        let rule = DiscountRule::new(self.uuid, rule)?;
        let uuid = rule.uuid();

        self.rules.push(rule);

        Ok(uuid)
    }

    /// Detach a rule.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] unless `Draft`, or
    /// [`CampaignError::RuleNotFound`].
    pub fn remove_rule(&mut self, uuid: RuleUuid) -> Result<DiscountRule, CampaignError> {
        self.ensure_status("remove a rule from", DRAFT)?;

        let index = self
            .rules
            .iter()
            .position(|rule| rule.uuid() == uuid)
            .ok_or(CampaignError::RuleNotFound(uuid))?;

        Ok(self.rules.remove(index))
    }

    /// Add a target to one of the campaign's rules.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] unless `Draft`,
    /// [`CampaignError::RuleNotFound`], or a target mismatch.
    pub fn add_rule_target(
        &mut self,
        uuid: RuleUuid,
        target: RuleTarget,
    ) -> Result<(), CampaignError> {
        self.ensure_status("change the targets of", DRAFT)?;

        let rule = self
            .rules
            .iter_mut()
            .find(|rule| rule.uuid() == uuid)
            .ok_or(CampaignError::RuleNotFound(uuid))?;

        rule.add_target(target)?;

        Ok(())
    }

    /// `Draft` to `Scheduled`; needs at least one rule.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] unless `Draft`, or
    /// [`CampaignError::NoRules`].
    pub fn schedule(&mut self) -> Result<(), CampaignError> {
        self.ensure_status("schedule", DRAFT)?;

        if self.rules.is_empty() {
            return Err(CampaignError::NoRules);
        }

        self.status = CampaignStatus::Scheduled;

        Ok(())
    }

    /// `Scheduled` or `Paused` to `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] from any other status.
    pub fn activate(&mut self) -> Result<(), CampaignError> {
        self.transition("activate", ACTIVATABLE, CampaignStatus::Active)
    }

    /// `Scheduled` or `Active` to `Paused`.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] from any other status.
    pub fn pause(&mut self) -> Result<(), CampaignError> {
        self.transition("pause", PAUSABLE, CampaignStatus::Paused)
    }

    /// `Active` to `Ended`.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] from any other status.
    pub fn end(&mut self) -> Result<(), CampaignError> {
        self.transition("end", ENDABLE, CampaignStatus::Ended)
    }

    /// Any non-terminal status to `Cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`CampaignError::InvalidOperation`] from `Ended` or `Cancelled`.
    pub fn cancel(&mut self) -> Result<(), CampaignError> {
        self.transition("cancel", CANCELLABLE, CampaignStatus::Cancelled)
    }

    /// Apply a lifecycle transition.
    ///
    /// # Errors
    ///
    /// See the individual transition methods.
    pub fn apply(&mut self, transition: CampaignTransition) -> Result<(), CampaignError> {
        match transition {
            CampaignTransition::Schedule => self.schedule(),
            CampaignTransition::Activate => self.activate(),
            CampaignTransition::Pause => self.pause(),
            CampaignTransition::End => self.end(),
            CampaignTransition::Cancel => self.cancel(),
        }
    }

    /// Soft-delete. Deleting twice keeps the first instant.
    pub fn delete(&mut self, now: Timestamp) {
        self.deleted_at.get_or_insert(now);
    }

    /// Whether the global limits allow another usage of `amount`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] if `amount` is not in the
    /// campaign currency.
    pub fn has_budget_for(&self, amount: Money) -> Result<bool, MoneyError> {
        let projected = self.total_discount_used.add(amount)?;

        if let Some(limit) = self.budget.total_budget_limit
            && projected.compare(&limit)?.is_gt()
        {
            return Ok(false);
        }

        if let Some(limit) = self.budget.total_usage_limit
            && self.total_usage_count >= limit
        {
            return Ok(false);
        }

        Ok(true)
    }

    /// Whether the per-customer limits allow another usage of `amount`,
    /// given the customer's existing non-reversed usage.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::CurrencyMismatch`] if `amount` is not in the
    /// campaign currency.
    pub fn has_customer_budget_for(
        &self,
        amount: Money,
        usage: &CustomerUsageAggregate,
    ) -> Result<bool, MoneyError> {
        let projected = self.customer_total(usage).add(amount)?;

        if let Some(limit) = self.budget.per_customer_budget_limit
            && projected.compare(&limit)?.is_gt()
        {
            return Ok(false);
        }

        if let Some(limit) = self.budget.per_customer_usage_limit
            && usage.usage_count >= limit
        {
            return Ok(false);
        }

        Ok(true)
    }

    /// Budget left before the total limit; `None` when unlimited.
    ///
    /// May be negative after a soft overrun.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the arithmetic fails.
    pub fn remaining_budget(&self) -> Result<Option<Money>, MoneyError> {
        self.budget
            .total_budget_limit
            .map(|limit| limit.sub(self.total_discount_used))
            .transpose()
    }

    /// Budget left for a customer before the per-customer limit; `None` when
    /// unlimited.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] if the arithmetic fails.
    pub fn remaining_customer_budget(
        &self,
        usage: &CustomerUsageAggregate,
    ) -> Result<Option<Money>, MoneyError> {
        self.budget
            .per_customer_budget_limit
            .map(|limit| limit.sub(self.customer_total(usage)))
            .transpose()
    }

    /// Account for one usage of `amount`. Budget is not checked here.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] on currency mismatch or overflow; totals are
    /// left unchanged.
    pub fn record_usage(&mut self, amount: Money) -> Result<(), MoneyError> {
        self.total_discount_used = self.total_discount_used.add(amount)?;
        self.total_usage_count = self.total_usage_count.saturating_add(1);

        Ok(())
    }

    /// Undo one usage of `amount`, flooring both totals at zero.
    ///
    /// # Errors
    ///
    /// Returns a [`MoneyError`] on currency mismatch; totals are left
    /// unchanged.
    pub fn reverse_usage(&mut self, amount: Money) -> Result<ReversalOutcome, MoneyError> {
        let zero = Money::zero(self.currency());
        let remaining = self.total_discount_used.sub(amount)?;

        let mut outcome = ReversalOutcome::Exact;

        self.total_discount_used = if remaining.compare(&zero)?.is_lt() {
            outcome = ReversalOutcome::Clamped;
            zero
        } else {
            remaining
        };

        self.total_usage_count = match self.total_usage_count.checked_sub(1) {
            Some(count) => count,
            None => {
                outcome = ReversalOutcome::Clamped;
                0
            }
        };

        Ok(outcome)
    }

    fn customer_total(&self, usage: &CustomerUsageAggregate) -> Money {
        Money::new(usage.total_discount, self.currency())
    }

    fn transition(
        &mut self,
        operation: &'static str,
        required: &'static [CampaignStatus],
        to: CampaignStatus,
    ) -> Result<(), CampaignError> {
        self.ensure_status(operation, required)?;
        self.status = to;

        Ok(())
    }

    fn ensure_status(
        &self,
        operation: &'static str,
        required: &'static [CampaignStatus],
    ) -> Result<(), CampaignError> {
        if required.contains(&self.status) {
            Ok(())
        } else {
            Err(CampaignError::InvalidOperation {
                operation,
                current: self.status,
                required,
            })
        }
    }
}

fn validate_details(
    name: &str,
    starts_at: Timestamp,
    ends_at: Timestamp,
) -> Result<String, ValidationError> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    if ends_at <= starts_at {
        return Err(ValidationError::InvalidDateRange { starts_at, ends_at });
    }

    Ok(name.to_string())
}
