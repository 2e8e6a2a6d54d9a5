//! Fixtures
//!
//! YAML documents describing a catalogue and its campaigns, seeded into a
//! [`CampaignStore`] through the administration and recording services.
//!
//! ```yaml
//! currency: TRY
//! categories:
//!   electronics: {}
//!   laptops: { parent: electronics }
//! products:
//!   ultrabook: { category: laptops, brand: acme }
//! customers:
//!   alice: { tier: gold }
//! campaigns:
//!   autumn:
//!     name: Autumn Sale
//!     status: active
//!     starts_at: 2026-09-01T00:00:00Z
//!     ends_at: 2026-11-30T23:59:59Z
//!     budget: { total_budget_limit: "100.00" }
//!     rules:
//!       - { discount: percentage, value: 50, categories: [electronics] }
//! ```

use std::{fs, path::Path, sync::Arc};

use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    admin::{CampaignsService, CampaignsServiceError, StoreCampaignsService},
    config::{BudgetEnforcement, EngineConfig, Rounding},
    fixtures::campaigns::{CampaignFixture, transitions_to},
    ids::OrderUuid,
    money::{Money, MoneyError, find_currency},
    recording::{RecordingService, UsageRecordingService, UsageRequest, UsageServiceError},
    store::CampaignStore,
};

pub use catalogue::{Catalogue, CategoryFixture, CustomerFixture, FixtureCustomer, ProductFixture};

pub mod campaigns;
pub mod catalogue;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Unknown currency code or unusable amount
    #[error("Invalid money: {0}")]
    Money(#[from] MoneyError),

    /// Category not declared
    #[error("Category not found: {0}")]
    UnknownCategory(String),

    /// Category parents loop back on themselves
    #[error("Category hierarchy loops through: {0}")]
    CategoryCycle(String),

    /// Brand not used by any product
    #[error("Brand not found: {0}")]
    UnknownBrand(String),

    /// Product not declared
    #[error("Product not found: {0}")]
    UnknownProduct(String),

    /// Customer not declared
    #[error("Customer not found: {0}")]
    UnknownCustomer(String),

    /// Campaign not declared
    #[error("Campaign not found: {0}")]
    UnknownCampaign(String),

    /// A rule targets more than one product or customer dimension
    #[error("Rule targets more than one {0} dimension")]
    ConflictingTargets(&'static str),

    /// Campaign rejected by administration
    #[error("Failed to create campaign: {0}")]
    Campaign(#[from] CampaignsServiceError),

    /// Prior usage could not be recorded
    #[error("Failed to record usage: {0}")]
    Usage(#[from] UsageServiceError),
}

/// Fixture document
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    /// ISO currency code of every amount in the document
    pub currency: String,

    /// Category name -> category
    #[serde(default)]
    pub categories: FxHashMap<String, CategoryFixture>,

    /// Product name -> product
    #[serde(default)]
    pub products: FxHashMap<String, ProductFixture>,

    /// Customer name -> customer
    #[serde(default)]
    pub customers: FxHashMap<String, CustomerFixture>,

    /// Campaign key -> campaign
    #[serde(default)]
    pub campaigns: FxHashMap<String, CampaignFixture>,
}

impl Fixture {
    /// Parse a fixture document.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Yaml`] if the document does not parse.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FixtureError> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// Read and parse a fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// The fixture currency.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Money`] for an unknown code.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        Ok(find_currency(&self.currency)?)
    }

    /// Create every campaign in `store` and return the resolved names.
    ///
    /// Campaigns are seeded in key order: created, given their rules and
    /// targets, moved to their declared status, then charged their prior
    /// usages (reversed ones are reversed again straight away).
    ///
    /// # Errors
    ///
    /// Returns an error if a name does not resolve or the store rejects a
    /// campaign or usage.
    pub async fn seed(&self, store: Arc<dyn CampaignStore>) -> Result<Catalogue, FixtureError> {
        let currency = self.currency()?;
        let mut catalogue = Catalogue::build(&self.categories, &self.products, &self.customers)?;

        let admin = StoreCampaignsService::new(Arc::clone(&store));

        // Prior usages are history; they are replayed as recorded.
        let recording = UsageRecordingService::new(
            store,
            EngineConfig {
                enforcement: BudgetEnforcement::Soft,
                rounding: Rounding::None,
                ..EngineConfig::default()
            },
        );

        let mut keys: Vec<&String> = self.campaigns.keys().collect();
        keys.sort();

        for key in keys {
            let Some(fixture) = self.campaigns.get(key) else {
                continue;
            };

            let campaign = admin.create_campaign(fixture.new_campaign(currency)).await?;
            let uuid = campaign.uuid();

            for rule_fixture in &fixture.rules {
                let (new_rule, targets) = rule_fixture.resolve(&catalogue)?;
                let rule = admin.add_rule(uuid, new_rule).await?;

                for target in targets {
                    admin.add_rule_target(uuid, rule.uuid(), target).await?;
                }
            }

            for transition in transitions_to(fixture.status) {
                admin.transition(uuid, *transition).await?;
            }

            for usage in &fixture.usages {
                let customer = catalogue.customer(&usage.customer)?.uuid;
                let order = OrderUuid::new();

                let request = UsageRequest {
                    campaign: uuid,
                    customer,
                    order,
                    order_item: None,
                    discount_amount: Money::new(usage.amount, currency),
                };

                recording.record_usage(request, fixture.starts_at).await?;

                if usage.reversed {
                    recording
                        .reverse_usage_for_order(order, fixture.starts_at)
                        .await?;
                }
            }

            catalogue.register_campaign(key, uuid);
        }

        Ok(catalogue)
    }
}

#[cfg(test)]
mod tests {
    use jiff::{Timestamp, ToSpan};
    use rust_decimal::dec;
    use testresult::TestResult;

    use super::*;
    use crate::{campaigns::CampaignStatus, store::InMemoryCampaignStore};

    const FIXTURE: &str = r#"
currency: TRY
categories:
  electronics: {}
  laptops: { parent: electronics }
products:
  ultrabook: { category: laptops, brand: acme }
  kettle: { brand: hearth }
customers:
  alice: { tier: gold }
  bob: {}
campaigns:
  autumn:
    name: Autumn Sale
    status: active
    priority: 2
    starts_at: 2026-09-01T00:00:00Z
    ends_at: 2026-11-30T23:59:59Z
    budget:
      total_budget_limit: "500.00"
      per_customer_usage_limit: 2
    rules:
      - discount: percentage
        value: 20
        categories: [electronics]
        tiers: [gold]
    usages:
      - { customer: alice, amount: "40.00" }
      - { customer: alice, amount: "10.00", reversed: true }
  winter:
    name: Winter Sale
    starts_at: 2026-12-01T00:00:00Z
    ends_at: 2027-01-31T23:59:59Z
    rules:
      - discount: fixed_amount
        value: 5
        brands: [hearth]
"#;

    #[tokio::test]
    async fn seeds_campaigns_with_rules_status_and_usage() -> TestResult {
        let fixture = Fixture::from_yaml_str(FIXTURE)?;
        let store: Arc<dyn CampaignStore> = Arc::new(InMemoryCampaignStore::new());

        let catalogue = fixture.seed(Arc::clone(&store)).await?;

        let autumn = store
            .get_campaign(catalogue.campaign("autumn")?)
            .await?
            .ok_or("autumn missing")?;

        assert_eq!(autumn.status(), CampaignStatus::Active);
        assert_eq!(autumn.rules().len(), 1);
        assert_eq!(autumn.total_usage_count(), 1);
        assert_eq!(autumn.total_discount_used().amount(), dec!(40));

        let alice = catalogue.customer("alice")?;
        let aggregate = store
            .find_customer_usage_aggregate(autumn.uuid(), alice.uuid)
            .await?;

        assert_eq!(aggregate.usage_count, 1);

        let winter = store
            .get_campaign(catalogue.campaign("winter")?)
            .await?
            .ok_or("winter missing")?;

        assert_eq!(winter.status(), CampaignStatus::Draft);

        let october: Timestamp = "2026-10-15T12:00:00Z".parse()?;
        let applicable = store.find_applicable_campaigns(october).await?;

        assert_eq!(applicable, vec![autumn]);
        assert!(
            store
                .find_applicable_campaigns(october + 2160.hours())
                .await?
                .is_empty()
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_customer_in_usage_fails() -> TestResult {
        let yaml = r#"
currency: TRY
campaigns:
  stray:
    name: Stray
    starts_at: 2026-01-01T00:00:00Z
    ends_at: 2026-02-01T00:00:00Z
    usages:
      - { customer: nobody, amount: "1" }
"#;

        let fixture = Fixture::from_yaml_str(yaml)?;
        let result = fixture.seed(Arc::new(InMemoryCampaignStore::new())).await;

        assert!(matches!(result, Err(FixtureError::UnknownCustomer(name)) if name == "nobody"));

        Ok(())
    }

    #[test]
    fn unknown_currency_is_rejected() -> TestResult {
        let fixture = Fixture::from_yaml_str("currency: XXQ\n")?;

        assert!(matches!(
            fixture.currency(),
            Err(FixtureError::Money(MoneyError::UnknownCurrency(_)))
        ));

        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = Fixture::from_yaml_str("currency: TRY\nprodcts: {}\n");

        assert!(matches!(result, Err(FixtureError::Yaml(_))));
    }
}
