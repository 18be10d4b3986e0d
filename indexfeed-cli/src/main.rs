//! indexfeed CLI: fetch, normalize, and cache inspection commands.
//!
//! Commands:
//! - `fetch`: acquire one or more markets and write the canonical table
//! - `fetch-all`: acquire every market in turn
//! - `normalize`: rebuild the canonical table from the newest raw snapshot
//! - `cache status`: report the last-known-good slot per market

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indexfeed_core::data::Resolution;
use indexfeed_core::domain::{Market, TradingDate};
use indexfeed_runner::{MarketRun, NormalizeRun, Pipeline, PipelineConfig, TableFormat};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "indexfeed",
    version,
    about = "indexfeed: daily TAIEX and OTC index acquisition with backtracking and cache fallback"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output root for raw/, cache/ and normalized/.
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the given markets (taiex, otc).
    Fetch {
        #[arg(required = true)]
        markets: Vec<Market>,

        #[command(flatten)]
        opts: FetchArgs,
    },
    /// Fetch every market.
    FetchAll {
        #[command(flatten)]
        opts: FetchArgs,
    },
    /// Re-normalize the newest raw snapshot of the given markets.
    Normalize {
        #[arg(required = true)]
        markets: Vec<Market>,

        /// Output format: csv, parquet or both.
        #[arg(long)]
        format: Option<TableFormat>,
    },
    /// Inspect the last-known-good cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Anchor date (YYYY-MM-DD or YYYYMMDD). Weekends roll back to Friday.
    #[arg(long)]
    date: Option<String>,

    /// Earlier trading days to try after the anchor.
    #[arg(long)]
    max_backtrack: Option<usize>,

    /// Do not fall back to the cached payload.
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Output format: csv, parquet or both.
    #[arg(long)]
    format: Option<TableFormat>,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show the cached date per market.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global.log_level);

    let mut config = PipelineConfig::load(cli.global.config.as_deref())?;
    if let Some(dir) = &cli.global.output_dir {
        config.output_dir = dir.clone();
    }
    tracing::debug!(
        output_dir = %config.output_dir.display(),
        timezone = %config.timezone,
        max_backtrack = config.max_backtrack,
        "configuration loaded"
    );

    match cli.command {
        Commands::Fetch { markets, opts } => run_fetch(config, &markets, &opts),
        Commands::FetchAll { opts } => run_fetch_all(config, &opts),
        Commands::Normalize { markets, format } => {
            if let Some(format) = format {
                config.table_format = format;
            }
            run_normalize(config, &markets)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(config),
        },
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    TradingDate::parse(s).ok_or_else(|| anyhow!("invalid date '{s}' (expected YYYY-MM-DD or YYYYMMDD)"))
}

/// Apply fetch flags over the loaded config and build the pipeline.
fn fetch_pipeline(mut config: PipelineConfig, opts: &FetchArgs) -> Result<(Pipeline, Option<NaiveDate>)> {
    let explicit = opts.date.as_deref().map(parse_date).transpose()?;
    if let Some(depth) = opts.max_backtrack {
        config.max_backtrack = depth;
    }
    if opts.no_cache {
        config.use_cache = false;
    }
    if let Some(format) = opts.format {
        config.table_format = format;
    }
    let pipeline = Pipeline::new(config).context("invalid configuration")?;
    Ok((pipeline, explicit))
}

fn run_fetch(config: PipelineConfig, markets: &[Market], opts: &FetchArgs) -> Result<()> {
    let (pipeline, explicit) = fetch_pipeline(config, opts)?;
    for &market in markets {
        let run = pipeline
            .fetch(market, explicit)
            .with_context(|| format!("fetch failed for {market}"))?;
        print_fetch_summary(&run);
    }
    Ok(())
}

fn run_fetch_all(config: PipelineConfig, opts: &FetchArgs) -> Result<()> {
    let (pipeline, explicit) = fetch_pipeline(config, opts)?;
    let runs = pipeline.fetch_all(explicit)?;
    for run in &runs {
        print_fetch_summary(run);
    }
    let live = runs.iter().filter(|r| r.acquisition.resolution.is_live()).count();
    println!();
    println!("{live}/{} market(s) live", runs.len());
    Ok(())
}

fn run_normalize(config: PipelineConfig, markets: &[Market]) -> Result<()> {
    let pipeline = Pipeline::new(config).context("invalid configuration")?;
    for &market in markets {
        match pipeline
            .normalize_latest(market)
            .with_context(|| format!("normalize failed for {market}"))?
        {
            Some(run) => print_normalize_summary(&run),
            None => println!(
                "{}: no raw snapshot under {}",
                market.label(),
                pipeline.output_root().join("raw").display()
            ),
        }
    }
    Ok(())
}

fn run_cache_status(config: PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::new(config).context("invalid configuration")?;
    println!("Cache: {}", pipeline.output_root().join("cache").display());
    println!();
    println!("{:<8} {:<12} {:<25}", "Market", "Last good", "Cached at");
    println!("{}", "-".repeat(45));
    for status in pipeline.cache_status() {
        let last_good = status
            .last_good_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".into());
        let cached_at = status
            .cached_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".into());
        println!("{:<8} {:<12} {:<25}", status.market.label(), last_good, cached_at);
    }
    Ok(())
}

fn describe(resolution: &Resolution) -> String {
    match resolution {
        Resolution::Found { attempt: 0, date } => format!("live data for {date}"),
        Resolution::Found { attempt, date } => {
            format!("live data for {date} ({attempt} day(s) back)")
        }
        Resolution::CacheFallback { source_date } => {
            format!("cached payload from {source_date}")
        }
        Resolution::EmptyFallback => "no data (empty fallback)".into(),
    }
}

fn print_fetch_summary(run: &MarketRun) {
    let acquisition = &run.acquisition;
    println!();
    println!("=== {} ===", acquisition.market.label());
    if let (Some(first), Some(last)) = (acquisition.candidates.first(), acquisition.candidates.last()) {
        println!("Candidates:   {first} back to {last}");
    }
    println!("Resolution:   {}", describe(&acquisition.resolution));
    println!("Snapshot:     {}", acquisition.path.display());
    println!("Rows:         {}", run.table.len());
    for path in &run.outputs {
        println!("Table:        {}", path.display());
    }
    if !acquisition.resolution.is_live() {
        println!("WARNING: {} data is not live for {}", acquisition.market.label(), acquisition.snapshot.date);
    }
}

fn print_normalize_summary(run: &NormalizeRun) {
    println!();
    println!("=== {} ===", run.market.label());
    println!("Snapshot:     {}", run.snapshot_path.display());
    println!("Rows:         {}", run.table.len());
    for path in &run.outputs {
        println!("Table:        {}", path.display());
    }
}
