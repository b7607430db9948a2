//! Screener CLI: screen, download, and cache management commands.
//!
//! Commands:
//! - `screen`: run the filter stages over a ticker universe
//! - `download`: warm the series cache for a list of symbols
//! - `cache status`: list cached symbols with date ranges and bar counts

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use screener_core::data::{
    self, warm_cache, CsvUniverse, ParquetStore, Universe, UniverseSource,
};
use screener_core::domain::Symbol;
use screener_runner::{
    build_cache, write_results, LoadOptions, Pipeline, ScreenConfig, ScreenOutcome, SortOrder,
};

#[derive(Parser)]
#[command(
    name = "screener",
    about = "Equity technical screener: RSI, EMA/MACD crossovers, volume spikes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen a universe through the enabled filter stages.
    Screen {
        /// Symbols to screen (e.g., AAPL MSFT). Combined with --universe.
        symbols: Vec<String>,

        /// CSV file with a `symbol` column.
        #[arg(long)]
        universe: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,

        /// Filters to run, in order (rsi, ema_crossover, macd_crossover, volume_spike).
        /// Overrides the config's filter list.
        #[arg(long = "filter", value_delimiter = ',')]
        filters: Vec<String>,

        /// Worker threads per stage (1-64).
        #[arg(long)]
        workers: Option<usize>,

        /// Write results to this file (.json or .csv).
        #[arg(long)]
        output: Option<PathBuf>,

        /// Sort key: `symbol`, a diagnostic name, or `-name` for descending.
        #[arg(long)]
        sort_by: Option<String>,
    },
    /// Fetch and cache series for a list of symbols.
    Download {
        /// Symbols to download. Combined with --universe.
        symbols: Vec<String>,

        /// CSV file with a `symbol` column.
        #[arg(long)]
        universe: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,

        /// Refetch even if the cached series is fresh.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached symbols with date range, bar count and last update.
    Status {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache directory. Overrides the config.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache directory. Overrides the config.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Offline mode: serve cached series only.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Use the synthetic random-walk provider instead of the network.
    #[arg(long, default_value_t = false)]
    synthetic: bool,
}

impl CommonArgs {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            synthetic: self.synthetic,
            offline: self.offline,
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Screen {
            symbols,
            universe,
            common,
            filters,
            workers,
            output,
            sort_by,
        } => run_screen(
            symbols,
            universe.as_deref(),
            &common,
            &filters,
            workers,
            output.as_deref(),
            sort_by.as_deref(),
        ),
        Commands::Download {
            symbols,
            universe,
            common,
            force,
        } => run_download(symbols, universe.as_deref(), &common, force),
        Commands::Cache { action } => match action {
            CacheAction::Status { config, cache_dir } => {
                run_cache_status(config.as_deref(), cache_dir)
            }
        },
    }
}

/// `RUST_LOG` controls verbosity; defaults to `info`.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<ScreenConfig> {
    let mut config = match path {
        Some(p) => ScreenConfig::load(p)?,
        None => ScreenConfig::default(),
    };
    if let Some(dir) = cache_dir {
        config.cache.dir = dir;
    }
    Ok(config)
}

fn resolve_universe(symbols: Vec<String>, csv: Option<&Path>) -> Result<Universe> {
    let mut all: Vec<Symbol> = Vec::new();
    if let Some(path) = csv {
        let from_csv = CsvUniverse::new(path)
            .load_universe()
            .with_context(|| format!("failed to load universe from {}", path.display()))?;
        all.extend(from_csv.symbols().iter().cloned());
    }
    all.extend(Universe::parse(&symbols)?.symbols().iter().cloned());

    let universe = Universe::from_symbols(all);
    if universe.is_empty() {
        bail!("no symbols given; pass tickers or --universe <csv>");
    }
    Ok(universe)
}

fn run_screen(
    symbols: Vec<String>,
    universe_csv: Option<&Path>,
    common: &CommonArgs,
    filters: &[String],
    workers: Option<usize>,
    output: Option<&Path>,
    sort_by: Option<&str>,
) -> Result<()> {
    let mut config = load_config(common.config.as_deref(), common.cache_dir.clone())?;
    if !filters.is_empty() {
        config.select_filters(filters)?;
    }
    if let Some(w) = workers {
        config.workers = w;
    }
    if let Some(s) = sort_by {
        config.sort = SortOrder::parse(s);
    }
    config.validate()?;

    let universe = resolve_universe(symbols, universe_csv)?;
    let cache = build_cache(&config, common.load_options())?;
    let pipeline = Pipeline::new(config.build_stages(), config.workers)?.with_sort(config.sort.clone());

    tracing::info!(
        "screening {} symbol(s) through [{}] with {} worker(s)",
        universe.len(),
        pipeline.stage_names().join(", "),
        pipeline.workers()
    );

    let progress = screener_runner::LogProgress::default();
    let outcome = pipeline.run(&universe, &cache, &progress, None);
    print_outcome(&outcome);

    if let Some(path) = output {
        write_results(&outcome.records, path)?;
        println!("Results saved to: {}", path.display());
    }
    Ok(())
}

fn run_download(
    symbols: Vec<String>,
    universe_csv: Option<&Path>,
    common: &CommonArgs,
    force: bool,
) -> Result<()> {
    let config = load_config(common.config.as_deref(), common.cache_dir.clone())?;
    config.validate()?;
    if common.offline {
        bail!("download needs network access; drop --offline");
    }

    let universe = resolve_universe(symbols, universe_csv)?;
    let cache = build_cache(&config, common.load_options())?;
    let summary = warm_cache(&cache, universe.symbols(), force, &data::LogProgress);

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_cache_status(config: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<()> {
    let config = load_config(config, cache_dir)?;
    let dir = &config.cache.dir;
    if !dir.exists() {
        println!("Cache directory does not exist: {}", dir.display());
        return Ok(());
    }

    let store = ParquetStore::new(dir);
    let entries = store.list()?;
    if entries.is_empty() {
        println!("Cache is empty: {}", dir.display());
        return Ok(());
    }

    println!("Cache: {}", dir.display());
    println!("Symbols: {}", entries.len());
    println!();
    println!(
        "{:<10} {:<25} {:>6} {:<12} {:<10}",
        "Symbol", "Date Range", "Bars", "Updated", "Source"
    );
    println!("{}", "-".repeat(67));
    for meta in &entries {
        println!(
            "{:<10} {:<25} {:>6} {:<12} {:<10}",
            meta.symbol,
            format!("{} to {}", meta.start_date, meta.end_date),
            meta.bar_count,
            meta.last_updated.to_string(),
            format!("{:?}", meta.source),
        );
    }
    Ok(())
}

fn print_outcome(outcome: &ScreenOutcome) {
    println!();
    println!("=== Screen Result ===");
    println!("Universe:       {} symbols", outcome.universe_size);
    for report in &outcome.stages {
        println!(
            "  {:<16} {:>5} evaluated {:>5} passed {:>5} rejected {:>5} failed",
            report.name, report.evaluated, report.passed, report.rejected, report.failed
        );
    }
    println!("Elapsed:        {:.1}s", outcome.elapsed.as_secs_f64());
    if outcome.interrupted {
        println!("WARNING: screen was interrupted; no results");
        return;
    }

    println!();
    if outcome.records.is_empty() {
        println!("No symbols passed all filters.");
        return;
    }
    println!("Passed ({}):", outcome.records.len());
    for record in &outcome.records {
        let diagnostics: Vec<String> = record
            .diagnostics
            .iter()
            .map(|(k, v)| {
                if k == "rsi" {
                    format!("{k}={v:.2}")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect();
        println!("  {:<10} {}", record.symbol.as_str(), diagnostics.join(" "));
    }
    println!();
}
