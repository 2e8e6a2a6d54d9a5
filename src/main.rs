//! Rebate CLI

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use clap::{Args, Parser, Subcommand};
use jiff::Timestamp;
use rust_decimal::Decimal;
use tracing::info;

use rebate::{
    config::{BudgetEnforcement, EngineConfig, LogFormat, Rounding},
    fixtures::{Catalogue, Fixture},
    money::Money,
    observability,
    rules::targeting::CustomerTier,
    selection::{DiscountCandidate, DiscountSelectionService, QuoteRequest, SelectionService},
    store::{CampaignStore, InMemoryCampaignStore},
};

#[derive(Debug, Parser)]
#[command(name = "rebate", about = "Campaign discount engine", long_about = None)]
struct Cli {
    /// Fixture describing the catalogue and campaigns
    #[arg(long, env = "REBATE_FIXTURE")]
    fixture: PathBuf,

    /// Engine configuration file
    #[arg(long, env = "REBATE_CONFIG")]
    config: Option<PathBuf>,

    /// Budget enforcement at commit (soft, strict)
    #[arg(long, env = "REBATE_ENFORCEMENT", value_enum)]
    enforcement: Option<BudgetEnforcement>,

    /// Rounding of quoted amounts (none, currency)
    #[arg(long, env = "REBATE_ROUNDING", value_enum)]
    rounding: Option<Rounding>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REBATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Quote the best discount for one order line
    Quote(QuoteArgs),
}

#[derive(Debug, Args)]
struct QuoteArgs {
    /// Product name from the fixture
    #[arg(long)]
    product: String,

    /// Customer name from the fixture
    #[arg(long)]
    customer: String,

    /// Tier override; defaults to the customer's fixture tier
    #[arg(long)]
    tier: Option<String>,

    /// Unit price in the fixture currency
    #[arg(long)]
    price: Decimal,

    /// Units on the line
    #[arg(long, default_value_t = 1)]
    quantity: u32,

    /// Instant to quote at (RFC 3339); defaults to now
    #[arg(long)]
    at: Option<Timestamp>,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig, String> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_path(path)
                .map_err(|error| format!("failed to load config {}: {error}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(enforcement) = self.enforcement {
            config.enforcement = enforcement;
        }

        if let Some(rounding) = self.rounding {
            config.rounding = rounding;
        }

        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }

        if let Some(format) = self.log_format {
            config.logging.format = format;
        }

        Ok(config)
    }
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = run(cli).await {
        #[expect(
            clippy::print_stderr,
            reason = "errors are reported to the terminal user"
        )]
        {
            eprintln!("{error}");
        }

        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = cli.engine_config()?;

    observability::init_subscriber(&config.logging).map_err(|error| error.to_string())?;

    let fixture = Fixture::from_path(&cli.fixture)
        .map_err(|error| format!("failed to load fixture {}: {error}", cli.fixture.display()))?;

    let store: Arc<dyn CampaignStore> = Arc::new(InMemoryCampaignStore::new());

    let catalogue = fixture
        .seed(Arc::clone(&store))
        .await
        .map_err(|error| format!("failed to seed fixture: {error}"))?;

    info!(campaigns = fixture.campaigns.len(), "seeded fixture");

    match cli.command {
        Commands::Quote(args) => quote(args, &fixture, &catalogue, store, config).await,
    }
}

async fn quote(
    args: QuoteArgs,
    fixture: &Fixture,
    catalogue: &Catalogue,
    store: Arc<dyn CampaignStore>,
    config: EngineConfig,
) -> Result<(), String> {
    let currency = fixture.currency().map_err(|error| error.to_string())?;
    let product = catalogue.product(&args.product).map_err(|error| error.to_string())?;
    let customer = catalogue
        .customer(&args.customer)
        .map_err(|error| error.to_string())?;

    let request = QuoteRequest {
        product: product.clone(),
        customer: customer.uuid,
        tier: args.tier.map(CustomerTier::new).or_else(|| customer.tier.clone()),
        unit_price: Money::new(args.price, currency),
        quantity: args.quantity,
    };

    let service = DiscountSelectionService::new(store, config);

    let candidate = service
        .quote(request, args.at.unwrap_or_else(Timestamp::now))
        .await
        .map_err(|error| format!("quote failed: {error}"))?;

    print_candidate(candidate.as_ref(), catalogue);

    Ok(())
}

#[expect(clippy::print_stdout, reason = "quote output is the command's result")]
fn print_candidate(candidate: Option<&DiscountCandidate>, catalogue: &Catalogue) {
    let Some(candidate) = candidate else {
        println!("no discount");

        return;
    };

    let campaign = catalogue
        .campaign_name(candidate.campaign)
        .unwrap_or("(unnamed)");

    println!("campaign:              {campaign} ({})", candidate.campaign);
    println!("rule:                  {}", candidate.rule);
    println!("line total:            {}", candidate.line_total);
    println!("discount:              {}", candidate.discount_amount);
    println!("discounted unit price: {}", candidate.discounted_unit_price);
    println!("discounted line total: {}", candidate.discounted_line_total);
}
