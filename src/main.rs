use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use comps_engine::config::AppConfig;
use comps_engine::error::AppError;
use comps_engine::telemetry;
use comps_engine::valuation::{
    valuation_router, AreaRangeForm, DealKind, EstimateResult, GeoScope, InMemoryRollupStore,
    InMemorySettingsStore, MatchResult, PropertyCategory, RollupEngine, RollupStore, SubjectForm,
    TenantId, TransactionArchive, ValuationService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Comparable Valuation Engine",
    about = "Estimate residential sale and lease values from comparable closed transactions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Value a single subject against a CSV transaction archive
    Estimate(EstimateArgs),
    /// Recompute the per-geography price-per-square-foot rollup
    Rollup(RollupArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
    /// Closed-transaction CSV archive to serve from
    #[arg(long)]
    transactions_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EstimateArgs {
    /// Closed-transaction CSV archive to search
    #[arg(long)]
    transactions_csv: PathBuf,
    /// Tenant whose adjustment values apply
    #[arg(long, default_value = "default")]
    tenant: String,
    /// Transaction direction (sale | lease)
    #[arg(long, value_parser = parse_deal)]
    deal: DealKind,
    /// Property category (condo | townhouse | semi_detached | detached | multiplex)
    #[arg(long, value_parser = parse_category)]
    category: PropertyCategory,
    #[arg(long)]
    bedrooms: Option<i16>,
    #[arg(long)]
    bathrooms: Option<i16>,
    /// Exact living area in square feet
    #[arg(long)]
    sqft: Option<u32>,
    /// Coarse living-area bucket, e.g. 800-899
    #[arg(long, value_parser = parse_sqft_range)]
    sqft_range: Option<AreaRangeForm>,
    #[arg(long)]
    parking: Option<i16>,
    #[arg(long)]
    lockers: Option<i16>,
    #[arg(long)]
    building: Option<String>,
    #[arg(long)]
    community: Option<String>,
    #[arg(long)]
    municipality: Option<String>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    annual_tax: Option<u32>,
    #[arg(long)]
    lot_frontage: Option<u16>,
    /// Listing id to exclude from its own comparable set
    #[arg(long)]
    exclude: Option<String>,
    /// Valuation date (YYYY-MM-DD, defaults to today)
    #[arg(long, value_parser = parse_date)]
    as_of: Option<NaiveDate>,
    /// Print the ranked comparables alongside the estimate
    #[arg(long)]
    list_comparables: bool,
}

#[derive(Args, Debug)]
struct RollupArgs {
    /// Closed-transaction CSV archive to scan
    #[arg(long)]
    transactions_csv: PathBuf,
    /// Only print summaries at this scope (building | community | municipality | region)
    #[arg(long, value_parser = parse_scope)]
    scope: Option<GeoScope>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Estimate(args) => run_estimate(args).await,
        Command::Rollup(args) => run_rollup(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn parse_deal(raw: &str) -> Result<DealKind, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "sale" => Ok(DealKind::Sale),
        "lease" | "rent" => Ok(DealKind::Lease),
        other => Err(format!("unknown deal kind '{other}' (expected sale or lease)")),
    }
}

fn parse_category(raw: &str) -> Result<PropertyCategory, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "condo" => Ok(PropertyCategory::Condo),
        "townhouse" => Ok(PropertyCategory::Townhouse),
        "semi_detached" | "semi-detached" => Ok(PropertyCategory::SemiDetached),
        "detached" => Ok(PropertyCategory::Detached),
        "multiplex" => Ok(PropertyCategory::Multiplex),
        other => Err(format!("unknown property category '{other}'")),
    }
}

fn parse_scope(raw: &str) -> Result<GeoScope, String> {
    GeoScope::parse(raw).ok_or_else(|| format!("unknown geography scope '{raw}'"))
}

fn parse_sqft_range(raw: &str) -> Result<AreaRangeForm, String> {
    let (lower, upper) = raw
        .split_once('-')
        .ok_or_else(|| format!("expected LOW-HIGH, got '{raw}'"))?;
    let lower = lower
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("bad lower bound in '{raw}': {err}"))?;
    let upper = upper
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("bad upper bound in '{raw}': {err}"))?;
    if lower > upper {
        return Err(format!("inverted range '{raw}'"));
    }
    Ok(AreaRangeForm { lower, upper })
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(path) = args.transactions_csv.take() {
        config.archive.transactions_csv = Some(path);
    }

    telemetry::init(&config.telemetry)?;

    let archive = match &config.archive.transactions_csv {
        Some(path) => {
            let archive = TransactionArchive::from_path(path)?;
            info!(path = %path.display(), records = archive.len(), "transaction archive loaded");
            archive
        }
        None => TransactionArchive::default(),
    };
    let archive = Arc::new(archive);

    let settings = Arc::new(InMemorySettingsStore::default());
    let service = Arc::new(ValuationService::new(archive.clone(), settings));

    let rollups = Arc::new(InMemoryRollupStore::default());
    if !archive.is_empty() {
        let engine = RollupEngine::new(archive.clone(), rollups.clone());
        let report = engine.run()?;
        info!(
            scanned = report.scanned,
            summaries = report.summaries,
            "startup rollup complete"
        );
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(valuation_router(service, rollups))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "valuation engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let archive = Arc::new(TransactionArchive::from_path(&args.transactions_csv)?);
    let settings = Arc::new(InMemorySettingsStore::default());
    let service = ValuationService::new(archive, settings);

    let tenant = TenantId(args.tenant.clone());
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());

    let subject = SubjectForm {
        deal: args.deal,
        category: args.category,
        style: None,
        bedrooms: args.bedrooms,
        bathrooms: args.bathrooms,
        exact_sqft: args.sqft,
        sqft_range: args.sqft_range,
        parking_spaces: args.parking,
        lockers: args.lockers,
        building: args.building.clone(),
        community: args.community.clone(),
        municipality: args.municipality.clone(),
        region: args.region.clone(),
        annual_tax: args.annual_tax,
        lot_frontage_ft: args.lot_frontage,
        exclude_listing: args.exclude.clone(),
    };

    let comparables = if args.list_comparables {
        Some(
            service
                .match_comparables(subject.clone(), &tenant, as_of)
                .map_err(AppError::Valuation)?,
        )
    } else {
        None
    };

    let estimate = service
        .estimate(subject, &tenant, false, as_of)
        .await
        .map_err(AppError::Valuation)?;

    render_estimate(&estimate, as_of, comparables.as_ref());
    Ok(())
}

fn run_rollup(args: RollupArgs) -> Result<(), AppError> {
    let archive = Arc::new(TransactionArchive::from_path(&args.transactions_csv)?);
    let store = Arc::new(InMemoryRollupStore::default());

    let engine = RollupEngine::new(archive.clone(), store.clone());
    let report = engine.run()?;

    println!("Rollup complete");
    println!(
        "Scanned {} closed transaction(s) into {} geography summaries",
        report.scanned, report.summaries
    );

    let scopes: Vec<GeoScope> = match args.scope {
        Some(scope) => vec![scope],
        None => vec![
            GeoScope::Building,
            GeoScope::Community,
            GeoScope::Municipality,
            GeoScope::Region,
        ],
    };

    for scope in scopes {
        let keys = archive_scope_keys(&archive, scope)?;
        for key in keys {
            if let Some(summary) = store.latest(scope, &key).map_err(map_store_error)? {
                println!("\n[{}] {}", summary.scope.label(), summary.scope_key);
                if let Some(sale) = &summary.sale {
                    println!(
                        "- sale: avg {:.2}/sqft, median {:.2}/sqft over {} close(s) ({} to {})",
                        sale.average_psf,
                        sale.median_psf,
                        sale.sample_count,
                        sale.earliest_close,
                        sale.latest_close
                    );
                }
                if let Some(lease) = &summary.lease {
                    println!(
                        "- lease: avg {:.2}/sqft, median {:.2}/sqft over {} close(s) ({} to {})",
                        lease.average_psf,
                        lease.median_psf,
                        lease.sample_count,
                        lease.earliest_close,
                        lease.latest_close
                    );
                }
            }
        }
    }

    Ok(())
}

fn archive_scope_keys(
    archive: &TransactionArchive,
    scope: GeoScope,
) -> Result<Vec<String>, AppError> {
    use comps_engine::valuation::TransactionScan;

    let mut keys: Vec<String> = archive
        .all_closed()
        .map_err(map_store_error)?
        .iter()
        .filter_map(|txn| txn.geography.key_for(scope).map(str::to_string))
        .collect();
    keys.sort();
    keys.dedup();
    Ok(keys)
}

fn map_store_error(error: comps_engine::valuation::StoreError) -> AppError {
    AppError::Valuation(comps_engine::valuation::ValuationError::Store(error))
}

fn render_estimate(estimate: &EstimateResult, as_of: NaiveDate, matched: Option<&MatchResult>) {
    println!("Valuation (as of {as_of})");
    println!(
        "Tier: {} '{}' with {} qualifying comparable(s) (tier minimum {})",
        estimate.scope.label(),
        estimate.scope_key,
        estimate.sample_count,
        estimate.min_samples
    );
    println!("Confidence: {}", estimate.confidence.label());

    if estimate.show_price {
        println!(
            "Estimate: {} (range {} to {}) from {} comparable(s)",
            estimate.estimated_price,
            estimate.range.low,
            estimate.range.high,
            estimate.comparables_used
        );
    } else {
        println!(
            "No price disclosed: only {} comparable(s) found at the broadest tier",
            estimate.sample_count
        );
    }

    if let Some(matched) = matched {
        println!("\nRanked comparables");
        for comparable in &matched.comparables {
            println!(
                "- [{:.3}] {}",
                comparable.similarity,
                comparable.transaction.short_summary()
            );
        }
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
