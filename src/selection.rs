//! Discount Selection
//!
//! Quotes the single best discount for one order line. Quoting only reads:
//! campaign totals and the usage ledger are untouched, so the same request
//! can be quoted any number of times.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{Span, debug};

use crate::{
    campaigns::{Campaign, budget::CustomerUsageAggregate},
    config::EngineConfig,
    ids::{CampaignUuid, CustomerUuid, ProductUuid, RuleUuid},
    money::{Money, MoneyError},
    rules::{
        DiscountRule,
        targeting::{CustomerTier, ProductContext},
    },
    store::{CampaignStore, StoreError},
};

/// Errors while quoting. Exhausted budgets are not errors.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// Reading campaigns or usage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Discount arithmetic failed.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// An order line to quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    /// Product and its catalogue facts.
    pub product: ProductContext,

    /// Buying customer.
    pub customer: CustomerUuid,

    /// The customer's tier, if any.
    pub tier: Option<CustomerTier>,

    /// Price of one unit.
    pub unit_price: Money,

    /// Units on the line.
    pub quantity: u32,
}

/// The winning discount for an order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountCandidate {
    /// Campaign granting the discount.
    pub campaign: CampaignUuid,

    /// Rule that produced it.
    pub rule: RuleUuid,

    /// Priority of the campaign at quote time.
    pub campaign_priority: i32,

    /// Customer it was quoted for.
    pub customer: CustomerUuid,

    /// Product it was quoted for.
    pub product: ProductUuid,

    /// Units on the line.
    pub quantity: u32,

    /// Undiscounted unit price.
    pub unit_price: Money,

    /// Undiscounted line total.
    pub line_total: Money,

    /// Discount for the whole line.
    pub discount_amount: Money,

    /// Unit price after spreading the discount across the line.
    pub discounted_unit_price: Money,

    /// Line total after the discount.
    pub discounted_line_total: Money,
}

impl DiscountCandidate {
    fn new(
        campaign: &Campaign,
        rule: &DiscountRule,
        request: &QuoteRequest,
        discount_amount: Money,
        config: &EngineConfig,
    ) -> Result<Self, MoneyError> {
        let line_total = request.unit_price.mul(Decimal::from(request.quantity))?;
        let per_unit = discount_amount.div(Decimal::from(request.quantity))?;

        Ok(Self {
            campaign: campaign.uuid(),
            rule: rule.uuid(),
            campaign_priority: campaign.priority(),
            customer: request.customer,
            product: request.product.product,
            quantity: request.quantity,
            unit_price: request.unit_price,
            line_total,
            discount_amount,
            discounted_unit_price: config.round(request.unit_price.sub(per_unit)?),
            discounted_line_total: line_total.sub(discount_amount)?,
        })
    }

    /// Strictly larger discount wins; equal discounts go to the higher
    /// priority; a full tie keeps the incumbent.
    fn beats(&self, incumbent: &Self) -> bool {
        let ours = self.discount_amount.amount();
        let theirs = incumbent.discount_amount.amount();

        ours > theirs || (ours == theirs && self.campaign_priority > incumbent.campaign_priority)
    }
}

/// Quotes discounts.
#[automock]
#[async_trait]
pub trait SelectionService: Send + Sync {
    /// The best discount for `request` at `point_in_time`, or `None`.
    async fn quote(
        &self,
        request: QuoteRequest,
        point_in_time: Timestamp,
    ) -> Result<Option<DiscountCandidate>, QuoteError>;
}

/// [`SelectionService`] over a [`CampaignStore`].
#[derive(Clone)]
pub struct DiscountSelectionService {
    store: Arc<dyn CampaignStore>,
    config: EngineConfig,
}

impl DiscountSelectionService {
    /// Create a selection service.
    #[must_use]
    pub fn new(store: Arc<dyn CampaignStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    async fn customer_usage(
        &self,
        campaign: &Campaign,
        customer: CustomerUuid,
    ) -> Result<CustomerUsageAggregate, StoreError> {
        if !campaign.budget().has_customer_constraints() {
            return Ok(CustomerUsageAggregate::none());
        }

        self.store
            .find_customer_usage_aggregate(campaign.uuid(), customer)
            .await
    }

    fn campaign_best(
        &self,
        campaign: &Campaign,
        request: &QuoteRequest,
        usage: &CustomerUsageAggregate,
    ) -> Result<Option<DiscountCandidate>, MoneyError> {
        let mut best: Option<DiscountCandidate> = None;

        for rule in campaign.rules() {
            if !rule.applies_to(&request.product)
                || !rule.applies_to_customer(request.customer, request.tier.as_ref())
            {
                continue;
            }

            let amount = self.config.round_discount(
                rule.calculate_discount(request.unit_price, request.quantity)?,
                rule.discount_ceiling(request.unit_price, request.quantity)?,
            )?;

            if !amount.is_positive() {
                continue;
            }

            let Some(amount) = clamp_to_budgets(campaign, amount, usage)? else {
                debug!(
                    campaign_uuid = %campaign.uuid(),
                    rule_uuid = %rule.uuid(),
                    "discount clamped to nothing by remaining budget"
                );

                continue;
            };

            let candidate = DiscountCandidate::new(campaign, rule, request, amount, &self.config)?;

            debug!(
                campaign_uuid = %campaign.uuid(),
                rule_uuid = %rule.uuid(),
                discount_amount = %candidate.discount_amount,
                "candidate discount"
            );

            if best.as_ref().is_none_or(|best| candidate.beats(best)) {
                best = Some(candidate);
            }
        }

        Ok(best)
    }
}

impl fmt::Debug for DiscountSelectionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscountSelectionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SelectionService for DiscountSelectionService {
    #[tracing::instrument(
        name = "selection.service.quote",
        skip(self, request),
        fields(
            product_uuid = %request.product.product,
            customer_uuid = %request.customer,
            quantity = request.quantity,
            campaign_count = tracing::field::Empty,
            campaign_uuid = tracing::field::Empty,
            discount_amount = tracing::field::Empty
        ),
        err
    )]
    async fn quote(
        &self,
        request: QuoteRequest,
        point_in_time: Timestamp,
    ) -> Result<Option<DiscountCandidate>, QuoteError> {
        let campaigns = self.store.find_applicable_campaigns(point_in_time).await?;

        let span = Span::current();

        span.record("campaign_count", campaigns.len());

        let mut best: Option<DiscountCandidate> = None;

        for campaign in &campaigns {
            if !request.unit_price.same_currency(&campaign.total_discount_used()) {
                debug!(campaign_uuid = %campaign.uuid(), "skipping campaign in another currency");

                continue;
            }

            let zero = Money::zero(campaign.currency());

            if !campaign.has_budget_for(zero)? {
                debug!(campaign_uuid = %campaign.uuid(), "skipping exhausted campaign");

                continue;
            }

            let usage = self.customer_usage(campaign, request.customer).await?;

            if !campaign.has_customer_budget_for(zero, &usage)? {
                debug!(
                    campaign_uuid = %campaign.uuid(),
                    "skipping campaign exhausted for customer"
                );

                continue;
            }

            if let Some(candidate) = self.campaign_best(campaign, &request, &usage)?
                && best.as_ref().is_none_or(|best| candidate.beats(best))
            {
                best = Some(candidate);
            }
        }

        if let Some(best) = &best {
            span.record("campaign_uuid", tracing::field::display(best.campaign));
            span.record(
                "discount_amount",
                tracing::field::display(best.discount_amount),
            );
        }

        Ok(best)
    }
}

/// Clamp to the remaining global budget, then the remaining customer budget.
/// `None` when either leaves nothing to grant.
fn clamp_to_budgets(
    campaign: &Campaign,
    amount: Money,
    usage: &CustomerUsageAggregate,
) -> Result<Option<Money>, MoneyError> {
    let mut amount = amount;

    for remaining in [
        campaign.remaining_budget()?,
        campaign.remaining_customer_budget(usage)?,
    ]
    .into_iter()
    .flatten()
    {
        amount = amount.min(remaining)?;

        if !amount.is_positive() {
            return Ok(None);
        }
    }

    Ok(Some(amount))
}

#[cfg(test)]
mod tests {
    use jiff::ToSpan;
    use rust_decimal::dec;
    use rusty_money::iso::{TRY, USD};
    use testresult::TestResult;

    use super::*;
    use crate::{
        campaigns::{NewCampaign, budget::CampaignBudget},
        ids::{CategoryUuid, OrderUuid},
        rules::{
            NewDiscountRule,
            targeting::{ProductTargetType, RuleTarget},
        },
        store::{InMemoryCampaignStore, MockCampaignStore},
        usage::CampaignUsage,
    };

    fn now() -> Timestamp {
        Timestamp::UNIX_EPOCH + 1.hour()
    }

    fn try_money(amount: Decimal) -> Money {
        Money::new(amount, TRY)
    }

    fn draft(priority: i32, budget: CampaignBudget) -> Result<Campaign, Box<dyn std::error::Error>> {
        Ok(Campaign::new(NewCampaign {
            name: format!("Campaign {priority}"),
            description: None,
            starts_at: Timestamp::UNIX_EPOCH,
            ends_at: Timestamp::UNIX_EPOCH + 24.hours(),
            priority,
            currency: TRY,
            budget,
        })?)
    }

    fn activate(mut campaign: Campaign) -> Result<Campaign, Box<dyn std::error::Error>> {
        campaign.schedule()?;
        campaign.activate()?;

        Ok(campaign)
    }

    fn percentage_campaign(
        priority: i32,
        percent: Decimal,
        budget: CampaignBudget,
    ) -> Result<Campaign, Box<dyn std::error::Error>> {
        let mut campaign = draft(priority, budget)?;
        campaign.add_rule(NewDiscountRule::percentage(percent))?;

        activate(campaign)
    }

    async fn store_with(
        campaigns: Vec<Campaign>,
        usages: Vec<CampaignUsage>,
    ) -> Result<Arc<InMemoryCampaignStore>, StoreError> {
        let store = Arc::new(InMemoryCampaignStore::new());
        let mut tx = store.begin().await?;

        for campaign in campaigns {
            tx.insert_campaign(campaign).await?;
        }

        for usage in usages {
            tx.insert_usage(usage).await?;
        }

        tx.commit().await?;

        Ok(store)
    }

    fn service(store: Arc<InMemoryCampaignStore>) -> DiscountSelectionService {
        DiscountSelectionService::new(store, EngineConfig::default())
    }

    fn request(price: Decimal, quantity: u32) -> QuoteRequest {
        QuoteRequest {
            product: ProductContext::new(ProductUuid::new()),
            customer: CustomerUuid::new(),
            tier: None,
            unit_price: try_money(price),
            quantity,
        }
    }

    #[tokio::test]
    async fn no_applicable_campaign_is_no_discount() -> TestResult {
        let store = store_with(vec![], vec![]).await?;

        let quote = service(store).quote(request(dec!(100), 1), now()).await?;

        assert_eq!(quote, None);

        Ok(())
    }

    #[tokio::test]
    async fn clamps_discount_to_remaining_budget() -> TestResult {
        let campaign = percentage_campaign(
            0,
            dec!(50),
            CampaignBudget::unlimited().with_total_budget_limit(try_money(dec!(100))),
        )?;
        let uuid = campaign.uuid();
        let store = store_with(vec![campaign], vec![]).await?;

        let quote = service(store)
            .quote(request(dec!(300), 1), now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.campaign, uuid);
        assert_eq!(quote.discount_amount, try_money(dec!(100)));
        assert_eq!(quote.discounted_unit_price, try_money(dec!(200)));
        assert_eq!(quote.discounted_line_total, try_money(dec!(200)));

        Ok(())
    }

    #[tokio::test]
    async fn equal_discounts_go_to_higher_priority() -> TestResult {
        let low = percentage_campaign(1, dec!(20), CampaignBudget::unlimited())?;
        let high = percentage_campaign(5, dec!(20), CampaignBudget::unlimited())?;
        let winner = high.uuid();

        // Both insertion orders must agree.
        for campaigns in [vec![low.clone(), high.clone()], vec![high, low]] {
            let store = store_with(campaigns, vec![]).await?;

            let quote = service(store)
                .quote(request(dec!(100), 1), now())
                .await?
                .ok_or("expected a discount")?;

            assert_eq!(quote.discount_amount, try_money(dec!(20)));
            assert_eq!(quote.campaign, winner);
            assert_eq!(quote.campaign_priority, 5);
        }

        Ok(())
    }

    #[tokio::test]
    async fn larger_discount_beats_priority() -> TestResult {
        let generous = percentage_campaign(0, dec!(30), CampaignBudget::unlimited())?;
        let urgent = percentage_campaign(10, dec!(10), CampaignBudget::unlimited())?;
        let winner = generous.uuid();
        let store = store_with(vec![urgent, generous], vec![]).await?;

        let quote = service(store)
            .quote(request(dec!(50), 2), now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.campaign, winner);
        assert_eq!(quote.discount_amount, try_money(dec!(30)));
        assert_eq!(quote.line_total, try_money(dec!(100)));

        Ok(())
    }

    #[tokio::test]
    async fn matches_category_through_ancestors() -> TestResult {
        let electronics = CategoryUuid::new();
        let laptops = CategoryUuid::new();

        let mut campaign = draft(0, CampaignBudget::unlimited())?;
        let rule = campaign.add_rule(
            NewDiscountRule::percentage(dec!(10)).targeting_products(ProductTargetType::Categories),
        )?;
        campaign.add_rule_target(rule, RuleTarget::Category(electronics))?;

        let store = store_with(vec![activate(campaign)?], vec![]).await?;
        let service = service(store);

        let mut laptop = request(dec!(1000), 1);
        laptop.product = ProductContext::new(ProductUuid::new()).with_category(laptops, [electronics]);

        let quote = service.quote(laptop, now()).await?;
        assert_eq!(
            quote.map(|quote| quote.discount_amount),
            Some(try_money(dec!(100)))
        );

        let mut unrelated = request(dec!(1000), 1);
        unrelated.product =
            ProductContext::new(ProductUuid::new()).with_category(CategoryUuid::new(), []);

        assert_eq!(service.quote(unrelated, now()).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn customer_usage_limit_blocks_only_that_customer() -> TestResult {
        let campaign = percentage_campaign(
            0,
            dec!(10),
            CampaignBudget::unlimited()
                .with_total_budget_limit(try_money(dec!(1000)))
                .with_per_customer_usage_limit(1),
        )?;

        let regular = request(dec!(100), 1);
        let prior = CampaignUsage::new(
            campaign.uuid(),
            regular.customer,
            OrderUuid::new(),
            None,
            try_money(dec!(10)),
            Timestamp::UNIX_EPOCH,
        );

        let store = store_with(vec![campaign], vec![prior]).await?;
        let service = service(store);

        assert_eq!(service.quote(regular, now()).await?, None);
        assert!(service.quote(request(dec!(100), 1), now()).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn customer_budget_clamps_after_global_budget() -> TestResult {
        let campaign = percentage_campaign(
            0,
            dec!(50),
            CampaignBudget::unlimited()
                .with_total_budget_limit(try_money(dec!(100)))
                .with_per_customer_budget_limit(try_money(dec!(40))),
        )?;

        let first = request(dec!(300), 1);
        let prior = CampaignUsage::new(
            campaign.uuid(),
            first.customer,
            OrderUuid::new(),
            None,
            try_money(dec!(15)),
            Timestamp::UNIX_EPOCH,
        );

        let store = store_with(vec![campaign], vec![prior]).await?;

        let quote = service(store)
            .quote(first, now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.discount_amount, try_money(dec!(25)));

        Ok(())
    }

    #[tokio::test]
    async fn exhausted_campaign_is_skipped() -> TestResult {
        let mut spent = percentage_campaign(
            9,
            dec!(50),
            CampaignBudget::unlimited().with_total_usage_limit(1),
        )?;
        spent.record_usage(try_money(dec!(1)))?;

        let fallback = percentage_campaign(0, dec!(5), CampaignBudget::unlimited())?;
        let winner = fallback.uuid();

        let store = store_with(vec![spent, fallback], vec![]).await?;

        let quote = service(store)
            .quote(request(dec!(100), 1), now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.campaign, winner);

        Ok(())
    }

    #[tokio::test]
    async fn inactive_or_out_of_window_campaigns_are_ignored() -> TestResult {
        let mut paused = percentage_campaign(0, dec!(50), CampaignBudget::unlimited())?;
        paused.pause()?;

        let mut drafted = draft(0, CampaignBudget::unlimited())?;
        drafted.add_rule(NewDiscountRule::percentage(dec!(50)))?;

        let live = percentage_campaign(0, dec!(50), CampaignBudget::unlimited())?;

        let store = store_with(vec![paused, drafted, live], vec![]).await?;
        let service = service(store);

        assert!(service.quote(request(dec!(10), 1), now()).await?.is_some());
        assert_eq!(
            service
                .quote(request(dec!(10), 1), Timestamp::UNIX_EPOCH + 25.hours())
                .await?,
            None
        );

        Ok(())
    }

    #[tokio::test]
    async fn fixed_amount_is_per_unit() -> TestResult {
        let mut campaign = draft(0, CampaignBudget::unlimited())?;
        campaign.add_rule(NewDiscountRule::fixed_amount(dec!(5)))?;

        let store = store_with(vec![activate(campaign)?], vec![]).await?;

        let quote = service(store)
            .quote(request(dec!(20), 3), now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.discount_amount, try_money(dec!(15)));
        assert_eq!(quote.discounted_unit_price, try_money(dec!(15)));
        assert_eq!(quote.discounted_line_total, try_money(dec!(45)));

        Ok(())
    }

    #[tokio::test]
    async fn amounts_are_rounded_to_currency() -> TestResult {
        let campaign = percentage_campaign(0, dec!(15), CampaignBudget::unlimited())?;
        let store = store_with(vec![campaign], vec![]).await?;

        let quote = service(store)
            .quote(request(dec!(0.99), 1), now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.discount_amount, try_money(dec!(0.15)));
        assert_eq!(quote.discounted_unit_price, try_money(dec!(0.84)));

        Ok(())
    }

    #[tokio::test]
    async fn rounding_never_lifts_a_discount_over_its_cap() -> TestResult {
        let mut campaign = draft(0, CampaignBudget::unlimited())?;
        campaign.add_rule(
            NewDiscountRule::percentage(dec!(50)).with_max_discount_amount(dec!(10.005)),
        )?;
        let store = store_with(vec![activate(campaign)?], vec![]).await?;

        let quote = service(store)
            .quote(request(dec!(100), 1), now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.discount_amount, try_money(dec!(10.00)));
        assert_eq!(quote.discounted_line_total, try_money(dec!(90.00)));

        Ok(())
    }

    #[tokio::test]
    async fn rounding_never_lifts_a_discount_over_the_line_total() -> TestResult {
        let mut campaign = draft(0, CampaignBudget::unlimited())?;
        campaign.add_rule(NewDiscountRule::fixed_amount(dec!(1)))?;
        let store = store_with(vec![activate(campaign)?], vec![]).await?;

        // Fixed 1 off a 0.005 line clamps to 0.005, which truncates to nothing.
        let dust = service(Arc::clone(&store))
            .quote(request(dec!(0.005), 1), now())
            .await?;

        assert_eq!(dust, None);

        let quote = service(store)
            .quote(request(dec!(0.015), 1), now())
            .await?
            .ok_or("expected a discount")?;

        assert_eq!(quote.discount_amount, try_money(dec!(0.01)));
        assert!(!quote.discounted_line_total.amount().is_sign_negative());
        assert!(!quote.discounted_unit_price.amount().is_sign_negative());

        Ok(())
    }

    #[tokio::test]
    async fn quote_does_not_touch_totals() -> TestResult {
        let campaign = percentage_campaign(0, dec!(10), CampaignBudget::unlimited())?;
        let uuid = campaign.uuid();
        let store = store_with(vec![campaign.clone()], vec![]).await?;
        let service = service(Arc::clone(&store));

        let first = service.quote(request(dec!(100), 1), now()).await?;
        let second = service.quote(request(dec!(100), 1), now()).await?;

        assert_eq!(
            first.map(|quote| quote.discount_amount),
            second.map(|quote| quote.discount_amount)
        );
        assert_eq!(store.get_campaign(uuid).await?, Some(campaign));

        Ok(())
    }

    #[tokio::test]
    async fn campaigns_in_another_currency_are_skipped() -> TestResult {
        let campaign = percentage_campaign(0, dec!(10), CampaignBudget::unlimited())?;
        let store = store_with(vec![campaign], vec![]).await?;

        let mut dollars = request(dec!(100), 1);
        dollars.unit_price = Money::new(dec!(100), USD);

        assert_eq!(service(store).quote(dollars, now()).await?, None);

        Ok(())
    }

    #[tokio::test]
    async fn store_failure_is_reported() -> TestResult {
        let mut store = MockCampaignStore::new();
        store
            .expect_find_applicable_campaigns()
            .returning(|_| Err(StoreError::Backend("connection reset".to_string())));

        let service = DiscountSelectionService::new(Arc::new(store), EngineConfig::default());

        let result = service.quote(request(dec!(100), 1), now()).await;

        assert!(matches!(result, Err(QuoteError::Store(StoreError::Backend(_)))));

        Ok(())
    }
}
