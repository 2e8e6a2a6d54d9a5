//! Integration tests for committing and reversing quoted discounts

use std::sync::Arc;

use jiff::Timestamp;
use rust_decimal::{Decimal, dec};
use testresult::TestResult;

use rebate::{
    config::{BudgetEnforcement, EngineConfig},
    fixtures::{Catalogue, Fixture},
    ids::{OrderItemUuid, OrderUuid},
    money::Money,
    recording::{RecordingService, UsageRecordingService, UsageServiceError},
    selection::{DiscountCandidate, DiscountSelectionService, QuoteRequest, SelectionService},
    store::{CampaignStore, InMemoryCampaignStore},
};

const SPRING_SALE: &str = include_str!("../fixtures/spring_sale.yaml");

struct Harness {
    catalogue: Catalogue,
    store: Arc<dyn CampaignStore>,
    selection: DiscountSelectionService,
    recording: UsageRecordingService,
}

impl Harness {
    async fn new(enforcement: BudgetEnforcement) -> TestResult<Self> {
        let fixture = Fixture::from_yaml_str(SPRING_SALE)?;
        let store: Arc<dyn CampaignStore> = Arc::new(InMemoryCampaignStore::new());
        let catalogue = fixture.seed(Arc::clone(&store)).await?;

        let config = EngineConfig {
            enforcement,
            ..EngineConfig::default()
        };

        Ok(Self {
            catalogue,
            selection: DiscountSelectionService::new(Arc::clone(&store), config.clone()),
            recording: UsageRecordingService::new(Arc::clone(&store), config),
            store,
        })
    }

    async fn quote(
        &self,
        product: &str,
        customer: &str,
        price: Decimal,
    ) -> TestResult<Option<DiscountCandidate>> {
        let customer = self.catalogue.customer(customer)?;

        let request = QuoteRequest {
            product: self.catalogue.product(product)?.clone(),
            customer: customer.uuid,
            tier: customer.tier.clone(),
            unit_price: Money::from_code(price, "TRY")?,
            quantity: 1,
        };

        Ok(self.selection.quote(request, now()?).await?)
    }
}

fn now() -> Result<Timestamp, jiff::Error> {
    "2026-04-15T12:00:00Z".parse()
}

#[tokio::test]
async fn committed_discounts_consume_the_campaign_budget() -> TestResult {
    let harness = Harness::new(BudgetEnforcement::Strict).await?;

    let candidate = harness
        .quote("ultrabook", "bob", dec!(300))
        .await?
        .ok_or("expected a discount")?;

    let usage = harness
        .recording
        .commit(&candidate, OrderUuid::new(), Some(OrderItemUuid::new()), now()?)
        .await?;

    assert_eq!(usage.discount_amount().amount(), dec!(100));

    let campaign = harness
        .store
        .get_campaign(candidate.campaign)
        .await?
        .ok_or("campaign missing")?;

    assert_eq!(campaign.total_discount_used().amount(), dec!(100));
    assert_eq!(campaign.total_usage_count(), 1);

    // Budget spent: nobody else gets the blowout.
    assert_eq!(harness.quote("ultrabook", "carol", dec!(300)).await?, None);

    Ok(())
}

#[tokio::test]
async fn reversing_an_order_restores_budget_once() -> TestResult {
    let harness = Harness::new(BudgetEnforcement::Strict).await?;
    let order = OrderUuid::new();

    let candidate = harness
        .quote("ultrabook", "bob", dec!(300))
        .await?
        .ok_or("expected a discount")?;

    harness
        .recording
        .commit(&candidate, order, None, now()?)
        .await?;

    let first = harness
        .recording
        .reverse_usage_for_order(order, now()?)
        .await?;

    assert_eq!(first.reversed, 1);
    assert_eq!(first.clamped, 0);

    let retry = harness
        .recording
        .reverse_usage_for_order(order, now()?)
        .await?;

    assert_eq!(retry.reversed, 0);
    assert_eq!(retry.already_reversed, 1);

    let campaign = harness
        .store
        .get_campaign(candidate.campaign)
        .await?
        .ok_or("campaign missing")?;

    assert!(campaign.total_discount_used().is_zero());
    assert_eq!(campaign.total_usage_count(), 0);

    let requote = harness
        .quote("ultrabook", "carol", dec!(300))
        .await?
        .ok_or("expected budget to be available again")?;

    assert_eq!(requote.discount_amount.amount(), dec!(100));

    Ok(())
}

#[tokio::test]
async fn strict_enforcement_rejects_a_stale_quote() -> TestResult {
    let harness = Harness::new(BudgetEnforcement::Strict).await?;

    let bob = harness
        .quote("ultrabook", "bob", dec!(300))
        .await?
        .ok_or("expected a discount")?;
    let carol = harness
        .quote("ultrabook", "carol", dec!(300))
        .await?
        .ok_or("expected a discount")?;

    harness
        .recording
        .commit(&bob, OrderUuid::new(), None, now()?)
        .await?;

    let result = harness
        .recording
        .commit(&carol, OrderUuid::new(), None, now()?)
        .await;

    assert!(
        matches!(result, Err(UsageServiceError::BudgetExhausted(uuid)) if uuid == carol.campaign)
    );

    Ok(())
}

#[tokio::test]
async fn soft_enforcement_accepts_a_bounded_overrun() -> TestResult {
    let harness = Harness::new(BudgetEnforcement::Soft).await?;

    let bob = harness
        .quote("ultrabook", "bob", dec!(300))
        .await?
        .ok_or("expected a discount")?;
    let carol = harness
        .quote("ultrabook", "carol", dec!(300))
        .await?
        .ok_or("expected a discount")?;

    harness
        .recording
        .commit(&bob, OrderUuid::new(), None, now()?)
        .await?;
    harness
        .recording
        .commit(&carol, OrderUuid::new(), None, now()?)
        .await?;

    let campaign = harness
        .store
        .get_campaign(bob.campaign)
        .await?
        .ok_or("campaign missing")?;

    assert_eq!(campaign.total_discount_used().amount(), dec!(200));
    assert_eq!(harness.quote("ultrabook", "bob", dec!(300)).await?, None);

    Ok(())
}

#[tokio::test]
async fn concurrent_strict_commits_never_exceed_the_budget() -> TestResult {
    let harness = Harness::new(BudgetEnforcement::Strict).await?;

    let candidate = harness
        .quote("ultrabook", "bob", dec!(300))
        .await?
        .ok_or("expected a discount")?;

    let at = now()?;

    let (first, second, third) = tokio::join!(
        harness.recording.commit(&candidate, OrderUuid::new(), None, at),
        harness.recording.commit(&candidate, OrderUuid::new(), None, at),
        harness.recording.commit(&candidate, OrderUuid::new(), None, at),
    );

    let committed = [first, second, third]
        .into_iter()
        .filter(Result::is_ok)
        .count();

    assert_eq!(committed, 1);

    let campaign = harness
        .store
        .get_campaign(candidate.campaign)
        .await?
        .ok_or("campaign missing")?;

    assert_eq!(campaign.total_discount_used().amount(), dec!(100));

    Ok(())
}

#[tokio::test]
async fn customer_usage_limit_applies_after_commit() -> TestResult {
    let harness = Harness::new(BudgetEnforcement::Strict).await?;
    let order = OrderUuid::new();

    let candidate = harness
        .quote("headphones", "bob", dec!(150))
        .await?
        .ok_or("expected a discount")?;

    harness
        .recording
        .commit(&candidate, order, None, now()?)
        .await?;

    assert_eq!(harness.quote("headphones", "bob", dec!(150)).await?, None);

    harness
        .recording
        .reverse_usage_for_order(order, now()?)
        .await?;

    assert!(harness.quote("headphones", "bob", dec!(150)).await?.is_some());

    Ok(())
}
