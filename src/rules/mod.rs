//! Discount Rules
//!
//! A rule is one targeting-and-calculation unit of a campaign: what it
//! discounts, by how much, for whom, and above which order gates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    campaigns::errors::ValidationError,
    ids::{BrandUuid, CampaignUuid, CategoryUuid, CustomerUuid, ProductUuid, RuleUuid},
    money::{Money, MoneyError},
    rules::targeting::{
        CustomerTarget, CustomerTargetType, CustomerTier, ProductContext, ProductTarget,
        ProductTargetType, RuleTarget, TargetDimension,
    },
};

pub mod targeting;

/// Discount type, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percentage of the line total.
    Percentage,

    /// Fixed amount per unit.
    FixedAmount,
}

/// How a rule computes its discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// `percent` of the line total, capped at `max_amount` when set.
    Percentage {
        /// Percentage in `(0, 100]`.
        percent: Decimal,

        /// Cap on the discount for one line.
        max_amount: Option<Decimal>,
    },

    /// `per_unit` off every unit, never more than the line total.
    FixedAmount {
        /// Amount off each unit.
        per_unit: Decimal,
    },
}

impl Discount {
    /// The discount type.
    pub const fn discount_type(&self) -> DiscountType {
        match self {
            Self::Percentage { .. } => DiscountType::Percentage,
            Self::FixedAmount { .. } => DiscountType::FixedAmount,
        }
    }

    /// The configured discount value.
    pub const fn value(&self) -> Decimal {
        match self {
            Self::Percentage { percent, .. } => *percent,
            Self::FixedAmount { per_unit } => *per_unit,
        }
    }

    /// Discount on a line of `quantity` units totalling `line_total`.
    fn apply(&self, line_total: Decimal, quantity: u32) -> Result<Decimal, MoneyError> {
        match self {
            Self::Percentage {
                percent,
                max_amount,
            } => {
                let rate = percent
                    .checked_div(Decimal::ONE_HUNDRED)
                    .ok_or(MoneyError::Overflow)?;

                let discount = line_total.checked_mul(rate).ok_or(MoneyError::Overflow)?;

                Ok(match max_amount {
                    Some(cap) => discount.min(*cap),
                    None => discount,
                })
            }
            Self::FixedAmount { per_unit } => {
                let discount = per_unit
                    .checked_mul(Decimal::from(quantity))
                    .ok_or(MoneyError::Overflow)?;

                Ok(discount.min(line_total))
            }
        }
    }
}

/// Input for a new discount rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDiscountRule {
    /// Discount type.
    pub discount_type: DiscountType,

    /// Percentage or per-unit amount.
    pub discount_value: Decimal,

    /// Cap for percentage discounts; ignored by fixed amounts.
    pub max_discount_amount: Option<Decimal>,

    /// Product targeting.
    pub product_target: ProductTargetType,

    /// Customer targeting.
    pub customer_target: CustomerTargetType,

    /// Minimum line total for the rule to apply.
    pub min_order_amount: Option<Decimal>,

    /// Minimum quantity for the rule to apply.
    pub min_quantity: Option<u32>,
}

impl NewDiscountRule {
    /// A percentage rule for every product and customer.
    pub fn percentage(percent: Decimal) -> Self {
        Self::untargeted(DiscountType::Percentage, percent)
    }

    /// A per-unit fixed amount rule for every product and customer.
    pub fn fixed_amount(per_unit: Decimal) -> Self {
        Self::untargeted(DiscountType::FixedAmount, per_unit)
    }

    fn untargeted(discount_type: DiscountType, discount_value: Decimal) -> Self {
        Self {
            discount_type,
            discount_value,
            max_discount_amount: None,
            product_target: ProductTargetType::AllProducts,
            customer_target: CustomerTargetType::AllCustomers,
            min_order_amount: None,
            min_quantity: None,
        }
    }

    /// Cap the discount.
    #[must_use]
    pub fn with_max_discount_amount(mut self, amount: Decimal) -> Self {
        self.max_discount_amount = Some(amount);
        self
    }

    /// Target products by the given type.
    #[must_use]
    pub fn targeting_products(mut self, target: ProductTargetType) -> Self {
        self.product_target = target;
        self
    }

    /// Target customers by the given type.
    #[must_use]
    pub fn targeting_customers(mut self, target: CustomerTargetType) -> Self {
        self.customer_target = target;
        self
    }

    /// Require a minimum line total.
    #[must_use]
    pub fn with_min_order_amount(mut self, amount: Decimal) -> Self {
        self.min_order_amount = Some(amount);
        self
    }

    /// Require a minimum quantity.
    #[must_use]
    pub fn with_min_quantity(mut self, quantity: u32) -> Self {
        self.min_quantity = Some(quantity);
        self
    }

    fn discount(&self) -> Result<Discount, ValidationError> {
        if self.discount_value <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveDiscountValue(
                self.discount_value,
            ));
        }

        if let Some(cap) = self.max_discount_amount
            && cap <= Decimal::ZERO
        {
            return Err(ValidationError::NonPositiveMaxDiscount(cap));
        }

        match self.discount_type {
            DiscountType::Percentage => {
                if self.discount_value > Decimal::ONE_HUNDRED {
                    return Err(ValidationError::PercentageOutOfRange(self.discount_value));
                }

                Ok(Discount::Percentage {
                    percent: self.discount_value,
                    max_amount: self.max_discount_amount,
                })
            }
            // The cap only bounds percentages; fixed amounts are bounded by the line.
            DiscountType::FixedAmount => Ok(Discount::FixedAmount {
                per_unit: self.discount_value,
            }),
        }
    }
}

/// A discount rule belonging to a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountRule {
    uuid: RuleUuid,
    campaign: CampaignUuid,
    discount: Discount,
    min_order_amount: Option<Decimal>,
    min_quantity: Option<u32>,
    products: ProductTarget,
    customers: CustomerTarget,
}

impl DiscountRule {
    /// Validate a new rule for `campaign`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for non-positive values or caps,
    /// percentages above 100, or invalid gates.
    pub fn new(campaign: CampaignUuid, rule: NewDiscountRule) -> Result<Self, ValidationError> {
        let discount = rule.discount()?;

        if let Some(amount) = rule.min_order_amount
            && amount < Decimal::ZERO
        {
            return Err(ValidationError::NegativeMinOrderAmount(amount));
        }

        if rule.min_quantity == Some(0) {
            return Err(ValidationError::ZeroMinQuantity);
        }

        Ok(Self {
            uuid: RuleUuid::new(),
            campaign,
            discount,
            min_order_amount: rule.min_order_amount,
            min_quantity: rule.min_quantity,
            products: ProductTarget::empty(rule.product_target),
            customers: CustomerTarget::empty(rule.customer_target),
        })
    }

    /// Rule id.
    pub const fn uuid(&self) -> RuleUuid {
        self.uuid
    }

    /// Owning campaign.
    pub const fn campaign(&self) -> CampaignUuid {
        self.campaign
    }

    /// Discount calculation.
    pub const fn discount(&self) -> &Discount {
        &self.discount
    }

    /// Minimum line total gate.
    pub const fn min_order_amount(&self) -> Option<Decimal> {
        self.min_order_amount
    }

    /// Minimum quantity gate.
    pub const fn min_quantity(&self) -> Option<u32> {
        self.min_quantity
    }

    /// Product targeting.
    pub const fn products(&self) -> &ProductTarget {
        &self.products
    }

    /// Customer targeting.
    pub const fn customers(&self) -> &CustomerTarget {
        &self.customers
    }

    /// Add a target of any dimension.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TargetMismatch`] when the rule does not
    /// target by the target's dimension.
    pub fn add_target(&mut self, target: RuleTarget) -> Result<(), ValidationError> {
        match target {
            RuleTarget::Product(product) => self.add_product(product),
            RuleTarget::Category(category) => self.add_category(category),
            RuleTarget::Brand(brand) => self.add_brand(brand),
            RuleTarget::Customer(customer) => self.add_customer(customer),
            RuleTarget::CustomerTier(tier) => self.add_customer_tier(tier),
        }
    }

    /// Add a product to a `SpecificProducts` rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TargetMismatch`] for any other product target.
    pub fn add_product(&mut self, product: ProductUuid) -> Result<(), ValidationError> {
        match &mut self.products {
            ProductTarget::SpecificProducts(products) => {
                products.insert(product);
                Ok(())
            }
            other => Err(mismatch(TargetDimension::Product, other.name())),
        }
    }

    /// Add a category to a `Categories` rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TargetMismatch`] for any other product target.
    pub fn add_category(&mut self, category: CategoryUuid) -> Result<(), ValidationError> {
        match &mut self.products {
            ProductTarget::Categories(categories) => {
                categories.insert(category);
                Ok(())
            }
            other => Err(mismatch(TargetDimension::Category, other.name())),
        }
    }

    /// Add a brand to a `Brands` rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TargetMismatch`] for any other product target.
    pub fn add_brand(&mut self, brand: BrandUuid) -> Result<(), ValidationError> {
        match &mut self.products {
            ProductTarget::Brands(brands) => {
                brands.insert(brand);
                Ok(())
            }
            other => Err(mismatch(TargetDimension::Brand, other.name())),
        }
    }

    /// Add a customer to a `SpecificCustomers` rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TargetMismatch`] for any other customer target.
    pub fn add_customer(&mut self, customer: CustomerUuid) -> Result<(), ValidationError> {
        match &mut self.customers {
            CustomerTarget::SpecificCustomers(customers) => {
                customers.insert(customer);
                Ok(())
            }
            other => Err(mismatch(TargetDimension::Customer, other.name())),
        }
    }

    /// Add a tier to a `CustomerTiers` rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TargetMismatch`] for any other customer target.
    pub fn add_customer_tier(&mut self, tier: CustomerTier) -> Result<(), ValidationError> {
        match &mut self.customers {
            CustomerTarget::CustomerTiers(tiers) => {
                tiers.insert(tier);
                Ok(())
            }
            other => Err(mismatch(TargetDimension::CustomerTier, other.name())),
        }
    }

    /// Whether the rule targets the product.
    pub fn applies_to_product(
        &self,
        product: ProductUuid,
        category: Option<CategoryUuid>,
        category_ancestors: &[CategoryUuid],
        brand: Option<BrandUuid>,
    ) -> bool {
        self.products
            .matches(product, category, category_ancestors, brand)
    }

    /// Whether the rule targets the product described by `context`.
    pub fn applies_to(&self, context: &ProductContext) -> bool {
        self.applies_to_product(
            context.product,
            context.category,
            &context.category_ancestors,
            context.brand,
        )
    }

    /// Whether the rule targets the customer.
    pub fn applies_to_customer(&self, customer: CustomerUuid, tier: Option<&CustomerTier>) -> bool {
        self.customers.matches(customer, tier)
    }

    /// The most this rule can grant on a line: the line total, or the cap when
    /// it is lower.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the line total does not fit.
    pub fn discount_ceiling(&self, unit_price: Money, quantity: u32) -> Result<Money, MoneyError> {
        let line_total = unit_price.mul(Decimal::from(quantity))?;

        Ok(match self.discount {
            Discount::Percentage {
                max_amount: Some(cap),
                ..
            } => Money::new(line_total.amount().min(cap), unit_price.currency()),
            Discount::Percentage { .. } | Discount::FixedAmount { .. } => line_total,
        })
    }

    /// Discount for `quantity` units at `unit_price`, in the price's currency.
    ///
    /// Returns zero when the quantity or line total gate is not met. No
    /// rounding is applied.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the arithmetic does not fit.
    pub fn calculate_discount(&self, unit_price: Money, quantity: u32) -> Result<Money, MoneyError> {
        let zero = Money::zero(unit_price.currency());

        if self.min_quantity.is_some_and(|min| quantity < min) {
            return Ok(zero);
        }

        let line_total = unit_price.mul(Decimal::from(quantity))?;

        if self
            .min_order_amount
            .is_some_and(|min| line_total.amount() < min)
        {
            return Ok(zero);
        }

        let amount = self.discount.apply(line_total.amount(), quantity)?;

        Ok(Money::new(amount, unit_price.currency()))
    }
}

fn mismatch(dimension: TargetDimension, configured: &'static str) -> ValidationError {
    ValidationError::TargetMismatch {
        dimension,
        configured,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use rusty_money::iso::TRY;
    use testresult::TestResult;

    use super::*;

    fn rule(new: NewDiscountRule) -> Result<DiscountRule, ValidationError> {
        DiscountRule::new(CampaignUuid::new(), new)
    }

    fn price(amount: Decimal) -> Money {
        Money::new(amount, TRY)
    }

    #[test]
    fn rejects_non_positive_value() {
        assert_eq!(
            rule(NewDiscountRule::percentage(Decimal::ZERO)),
            Err(ValidationError::NonPositiveDiscountValue(Decimal::ZERO))
        );
        assert_eq!(
            rule(NewDiscountRule::fixed_amount(dec!(-1))),
            Err(ValidationError::NonPositiveDiscountValue(dec!(-1)))
        );
    }

    #[test]
    fn rejects_percentage_above_one_hundred() {
        assert_eq!(
            rule(NewDiscountRule::percentage(dec!(100.01))),
            Err(ValidationError::PercentageOutOfRange(dec!(100.01)))
        );
        assert!(rule(NewDiscountRule::percentage(dec!(100))).is_ok());
    }

    #[test]
    fn fixed_amount_ignores_cap() -> TestResult {
        let capped =
            rule(NewDiscountRule::fixed_amount(dec!(5)).with_max_discount_amount(dec!(3)))?;

        assert_eq!(capped.discount(), &Discount::FixedAmount { per_unit: dec!(5) });
        assert_eq!(capped.calculate_discount(price(dec!(20)), 2)?, price(dec!(10)));

        assert_eq!(
            rule(NewDiscountRule::fixed_amount(dec!(5)).with_max_discount_amount(dec!(-1))),
            Err(ValidationError::NonPositiveMaxDiscount(dec!(-1)))
        );

        Ok(())
    }

    #[test]
    fn rejects_invalid_gates() {
        assert_eq!(
            rule(NewDiscountRule::percentage(dec!(10)).with_min_quantity(0)),
            Err(ValidationError::ZeroMinQuantity)
        );
        assert_eq!(
            rule(NewDiscountRule::percentage(dec!(10)).with_min_order_amount(dec!(-5))),
            Err(ValidationError::NegativeMinOrderAmount(dec!(-5)))
        );
        assert_eq!(
            rule(NewDiscountRule::percentage(dec!(10)).with_max_discount_amount(Decimal::ZERO)),
            Err(ValidationError::NonPositiveMaxDiscount(Decimal::ZERO))
        );
    }

    #[test]
    fn percentage_of_line_total() -> TestResult {
        let rule = rule(NewDiscountRule::percentage(dec!(50)))?;

        assert_eq!(rule.calculate_discount(price(dec!(300)), 1)?, price(dec!(150)));
        assert_eq!(rule.calculate_discount(price(dec!(19.99)), 3)?, price(dec!(29.985)));

        Ok(())
    }

    #[test]
    fn percentage_is_capped() -> TestResult {
        let rule = rule(NewDiscountRule::percentage(dec!(20)).with_max_discount_amount(dec!(25)))?;

        assert_eq!(rule.calculate_discount(price(dec!(100)), 1)?, price(dec!(20)));
        assert_eq!(rule.calculate_discount(price(dec!(100)), 2)?, price(dec!(25)));
        assert_eq!(
            rule.calculate_discount(price(dec!(1_000_000)), 1_000)?,
            price(dec!(25))
        );

        Ok(())
    }

    #[test]
    fn fixed_amount_is_per_unit() -> TestResult {
        let rule = rule(NewDiscountRule::fixed_amount(dec!(5)))?;

        assert_eq!(rule.calculate_discount(price(dec!(20)), 3)?, price(dec!(15)));

        Ok(())
    }

    #[test]
    fn fixed_amount_never_exceeds_line_total() -> TestResult {
        let rule = rule(NewDiscountRule::fixed_amount(dec!(50)))?;

        assert_eq!(rule.calculate_discount(price(dec!(20)), 3)?, price(dec!(60)));
        assert_eq!(rule.calculate_discount(price(dec!(0.99)), 7)?, price(dec!(6.93)));

        Ok(())
    }

    #[test]
    fn gates_return_zero_for_either_type() -> TestResult {
        for new in [
            NewDiscountRule::percentage(dec!(10)),
            NewDiscountRule::fixed_amount(dec!(1)),
        ] {
            let gated = rule(new.with_min_quantity(3).with_min_order_amount(dec!(100)))?;

            assert!(gated.calculate_discount(price(dec!(50)), 2)?.is_zero());
            assert!(gated.calculate_discount(price(dec!(10)), 5)?.is_zero());
            assert!(gated.calculate_discount(price(dec!(50)), 3)?.is_positive());
        }

        Ok(())
    }

    #[test]
    fn min_order_amount_is_inclusive() -> TestResult {
        let rule = rule(NewDiscountRule::percentage(dec!(10)).with_min_order_amount(dec!(100)))?;

        assert_eq!(rule.calculate_discount(price(dec!(50)), 2)?, price(dec!(10)));

        Ok(())
    }

    #[test]
    fn adding_targets_checks_dimension() -> TestResult {
        let mut rule = rule(
            NewDiscountRule::percentage(dec!(10))
                .targeting_products(ProductTargetType::SpecificProducts),
        )?;

        assert!(rule.add_product(ProductUuid::new()).is_ok());
        assert_eq!(
            rule.add_category(CategoryUuid::new()),
            Err(ValidationError::TargetMismatch {
                dimension: TargetDimension::Category,
                configured: "specific products",
            })
        );
        assert!(matches!(
            rule.add_customer(CustomerUuid::new()),
            Err(ValidationError::TargetMismatch {
                dimension: TargetDimension::Customer,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn adding_existing_target_is_a_no_op() -> TestResult {
        let mut rule = rule(
            NewDiscountRule::percentage(dec!(10))
                .targeting_customers(CustomerTargetType::CustomerTiers),
        )?;

        rule.add_target(RuleTarget::CustomerTier("gold".into()))?;
        let before = rule.clone();
        rule.add_target(RuleTarget::CustomerTier("gold".into()))?;

        assert_eq!(rule, before);
        assert!(rule.applies_to_customer(CustomerUuid::new(), Some(&"gold".into())));

        Ok(())
    }

    #[test]
    fn category_rule_applies_through_ancestors() -> TestResult {
        let electronics = CategoryUuid::new();
        let laptops = CategoryUuid::new();

        let mut rule = rule(
            NewDiscountRule::percentage(dec!(10)).targeting_products(ProductTargetType::Categories),
        )?;
        rule.add_category(electronics)?;

        let context = ProductContext::new(ProductUuid::new()).with_category(laptops, [electronics]);

        assert!(rule.applies_to(&context));

        Ok(())
    }
}
