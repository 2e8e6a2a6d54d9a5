//! Campaign Fixtures

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Deserialize;

use crate::{
    campaigns::{CampaignStatus, CampaignTransition, NewCampaign, budget::CampaignBudget},
    fixtures::{FixtureError, catalogue::Catalogue},
    money::Money,
    rules::{
        DiscountType, NewDiscountRule,
        targeting::{CustomerTargetType, CustomerTier, ProductTargetType, RuleTarget},
    },
};

/// Campaign fixture from YAML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignFixture {
    /// Display name
    pub name: String,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Start of the date window
    pub starts_at: Timestamp,

    /// End of the date window
    pub ends_at: Timestamp,

    /// Tie-break priority
    #[serde(default)]
    pub priority: i32,

    /// Status to drive the campaign to after its rules are attached
    #[serde(default = "draft")]
    pub status: CampaignStatus,

    /// Limits, as amounts in the fixture currency
    #[serde(default)]
    pub budget: BudgetFixture,

    /// Discount rules
    #[serde(default)]
    pub rules: Vec<RuleFixture>,

    /// Usage recorded before the fixture is handed over
    #[serde(default)]
    pub usages: Vec<UsageFixture>,
}

const fn draft() -> CampaignStatus {
    CampaignStatus::Draft
}

impl CampaignFixture {
    pub(super) fn new_campaign(&self, currency: &'static Currency) -> NewCampaign {
        NewCampaign {
            name: self.name.clone(),
            description: self.description.clone(),
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            priority: self.priority,
            currency,
            budget: self.budget.to_budget(currency),
        }
    }
}

/// Lifecycle transitions from `Draft` to `status`.
pub(super) const fn transitions_to(status: CampaignStatus) -> &'static [CampaignTransition] {
    match status {
        CampaignStatus::Draft => &[],
        CampaignStatus::Scheduled => &[CampaignTransition::Schedule],
        CampaignStatus::Active => &[CampaignTransition::Schedule, CampaignTransition::Activate],
        CampaignStatus::Paused => &[
            CampaignTransition::Schedule,
            CampaignTransition::Activate,
            CampaignTransition::Pause,
        ],
        CampaignStatus::Ended => &[
            CampaignTransition::Schedule,
            CampaignTransition::Activate,
            CampaignTransition::End,
        ],
        CampaignStatus::Cancelled => &[CampaignTransition::Cancel],
    }
}

/// Budget fixture from YAML
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetFixture {
    /// Total discount cap
    #[serde(default)]
    pub total_budget_limit: Option<Decimal>,

    /// Total usage cap
    #[serde(default)]
    pub total_usage_limit: Option<u64>,

    /// Per-customer discount cap
    #[serde(default)]
    pub per_customer_budget_limit: Option<Decimal>,

    /// Per-customer usage cap
    #[serde(default)]
    pub per_customer_usage_limit: Option<u64>,
}

impl BudgetFixture {
    fn to_budget(&self, currency: &'static Currency) -> CampaignBudget {
        CampaignBudget {
            total_budget_limit: self
                .total_budget_limit
                .map(|amount| Money::new(amount, currency)),
            total_usage_limit: self.total_usage_limit,
            per_customer_budget_limit: self
                .per_customer_budget_limit
                .map(|amount| Money::new(amount, currency)),
            per_customer_usage_limit: self.per_customer_usage_limit,
        }
    }
}

/// Rule fixture from YAML
///
/// At most one of `products`, `categories` and `brands` may be given, and at
/// most one of `customers` and `tiers`. Omitting them targets everyone.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFixture {
    /// Discount type
    pub discount: DiscountType,

    /// Percentage or per-unit amount
    pub value: Decimal,

    /// Cap for percentage discounts
    #[serde(default)]
    pub max_discount_amount: Option<Decimal>,

    /// Minimum line total
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,

    /// Minimum quantity
    #[serde(default)]
    pub min_quantity: Option<u32>,

    /// Targeted product names
    #[serde(default)]
    pub products: Vec<String>,

    /// Targeted category names
    #[serde(default)]
    pub categories: Vec<String>,

    /// Targeted brand names
    #[serde(default)]
    pub brands: Vec<String>,

    /// Targeted customer names
    #[serde(default)]
    pub customers: Vec<String>,

    /// Targeted tiers
    #[serde(default)]
    pub tiers: Vec<CustomerTier>,
}

impl RuleFixture {
    /// The rule and the targets to add to it once attached.
    pub(super) fn resolve(
        &self,
        catalogue: &Catalogue,
    ) -> Result<(NewDiscountRule, Vec<RuleTarget>), FixtureError> {
        let mut rule = NewDiscountRule {
            discount_type: self.discount,
            discount_value: self.value,
            max_discount_amount: self.max_discount_amount,
            product_target: ProductTargetType::AllProducts,
            customer_target: CustomerTargetType::AllCustomers,
            min_order_amount: self.min_order_amount,
            min_quantity: self.min_quantity,
        };

        let mut targets = Vec::new();

        let product_dimensions = [
            !self.products.is_empty(),
            !self.categories.is_empty(),
            !self.brands.is_empty(),
        ];

        if product_dimensions.iter().filter(|set| **set).count() > 1 {
            return Err(FixtureError::ConflictingTargets("products"));
        }

        if !self.products.is_empty() {
            rule.product_target = ProductTargetType::SpecificProducts;

            for name in &self.products {
                targets.push(RuleTarget::Product(catalogue.product(name)?.product));
            }
        } else if !self.categories.is_empty() {
            rule.product_target = ProductTargetType::Categories;

            for name in &self.categories {
                targets.push(RuleTarget::Category(catalogue.category(name)?));
            }
        } else if !self.brands.is_empty() {
            rule.product_target = ProductTargetType::Brands;

            for name in &self.brands {
                targets.push(RuleTarget::Brand(catalogue.brand(name)?));
            }
        }

        if !self.customers.is_empty() && !self.tiers.is_empty() {
            return Err(FixtureError::ConflictingTargets("customers"));
        }

        if !self.customers.is_empty() {
            rule.customer_target = CustomerTargetType::SpecificCustomers;

            for name in &self.customers {
                targets.push(RuleTarget::Customer(catalogue.customer(name)?.uuid));
            }
        } else if !self.tiers.is_empty() {
            rule.customer_target = CustomerTargetType::CustomerTiers;

            targets.extend(self.tiers.iter().cloned().map(RuleTarget::CustomerTier));
        }

        Ok((rule, targets))
    }
}

/// Prior usage fixture from YAML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageFixture {
    /// Customer name
    pub customer: String,

    /// Discount granted
    pub amount: Decimal,

    /// Whether the usage was later reversed
    #[serde(default)]
    pub reversed: bool,
}
