use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use domain::{
    CartDaySnapshot, Catalog, CatalogEntry, ClubbingCalculator, Clock, DeliveryConfig,
    InMemoryCatalog, Money, Order, PendingAmendment, ProductId, SystemClock, Weekday,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "delivery", about = "Multi-day delivery planning tools", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Plan which cart days ship together
    Plan(PlanArgs),
    /// Price an order from its day totals
    Totals(TotalsArgs),
    /// Merge a paid amendment into an order
    Merge(MergeArgs),
    /// Check whether ordering for a weekday is still open
    Window(WindowArgs),
}

#[derive(Debug, Args)]
struct PlanArgs {
    /// JSON file holding the cart days
    #[arg(long)]
    cart: PathBuf,

    /// Delivery location; selects a configured minimum order value
    #[arg(long)]
    location: Option<String>,

    /// Minimum order value overriding the configuration, e.g. 10.00
    #[arg(long)]
    min_cart_value: Option<Money>,
}

#[derive(Debug, Args)]
struct TotalsArgs {
    /// Day totals, e.g. 7.29 5.00
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    day_totals: Vec<Money>,
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// JSON file holding the order
    #[arg(long)]
    order: PathBuf,

    /// JSON file holding the paid amendment
    #[arg(long)]
    amendment: PathBuf,

    /// JSON file mapping product ids to catalog entries
    #[arg(long)]
    catalog: PathBuf,

    /// Local time used to date new days, e.g. 2024-05-15T10:00:00
    #[arg(long)]
    at: Option<NaiveDateTime>,
}

#[derive(Debug, Args)]
struct WindowArgs {
    /// Day of the week, e.g. friday or fri
    weekday: Weekday,

    /// Local time to check at, e.g. 2024-05-15T10:00:00
    #[arg(long)]
    at: Option<NaiveDateTime>,
}

impl Cli {
    /// Runs the command and returns its JSON output.
    pub(crate) async fn run(self, config: &DeliveryConfig) -> Result<Value, CliError> {
        match self.command {
            Commands::Plan(args) => plan(args, config),
            Commands::Totals(args) => totals(args, config),
            Commands::Merge(args) => merge(args, config).await,
            Commands::Window(args) => Ok(window(args, config)),
        }
    }
}

fn plan(args: PlanArgs, config: &DeliveryConfig) -> Result<Value, CliError> {
    let cart: Vec<CartDaySnapshot> = read_json(&args.cart)?;
    let min_cart_value = args
        .min_cart_value
        .unwrap_or_else(|| config.min_cart_value_for(args.location.as_deref()));

    let result = ClubbingCalculator::default().plan(&cart, min_cart_value)?;
    if !result.can_checkout {
        tracing::info!(shortfall = %result.total_shortfall, "cart cannot be checked out");
    }
    Ok(serde_json::to_value(result)?)
}

fn totals(args: TotalsArgs, config: &DeliveryConfig) -> Result<Value, CliError> {
    let totals = config.fee_policy.compute_totals(&args.day_totals)?;
    Ok(serde_json::to_value(totals)?)
}

async fn merge(args: MergeArgs, config: &DeliveryConfig) -> Result<Value, CliError> {
    let order: Order = read_json(&args.order)?;
    let amendment: PendingAmendment = read_json(&args.amendment)?;
    let entries: HashMap<ProductId, CatalogEntry> = read_json(&args.catalog)?;

    let catalog = InMemoryCatalog::with_entries(entries);
    let prices = catalog.fetch_products(&amendment.product_ids()).await;
    let now = args.at.unwrap_or_else(|| SystemClock.now());

    let outcome = config.merger().merge(&order, &amendment, &prices, now)?;
    if outcome.is_partial() {
        tracing::warn!(dropped = outcome.dropped.len(), "amendment merged partially");
    }
    Ok(serde_json::to_value(outcome)?)
}

fn window(args: WindowArgs, config: &DeliveryConfig) -> Value {
    let resolver = config.resolver();
    let now = args.at.unwrap_or_else(|| SystemClock.now());
    json!({
        "weekday": args.weekday,
        "date": resolver.resolve_date_for_weekday(args.weekday, now),
        "cutoff_hour": resolver.cutoff_hour(),
        "closed": resolver.is_ordering_window_closed(args.weekday, now),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
