//! Pagewalk main entry point
//!
//! This is the command-line interface for the Pagewalk paginated scraper.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pagewalk::config::{load_config_with_hash, Config};
use pagewalk::crawler::{
    load_seeds, ControlToken, Fetcher, HttpFetcher, PageView, Scraper, SelectorRules,
};
use pagewalk::output::{export_items, load_statistics, print_statistics, ExportFormat};
use pagewalk::storage::{open_store, InfoFilter, RecordStore};
use pagewalk::ScrapeError;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Pagewalk: a resumable paginated scraper
///
/// Pagewalk walks paginated listings from seed URLs, stores every item URL it
/// finds exactly once, and enriches stored items with info extracted from
/// their pages.
#[derive(Parser, Debug)]
#[command(name = "pagewalk")]
#[command(version = "1.0.0")]
#[command(about = "A resumable paginated scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and show what would run
    Check,

    /// Walk the pagination chain of every seed and store the item URLs found
    Urls {
        /// File with one seed URL per line
        #[arg(value_name = "SEEDS_FILE")]
        seeds_file: Option<PathBuf>,

        /// Additional seed URL (repeatable)
        #[arg(long = "seed", value_name = "URL")]
        seeds: Vec<String>,
    },

    /// Fetch info for items that have none
    Infos {
        /// Re-extract info for every item, not only those without it
        #[arg(long)]
        refresh: bool,
    },

    /// Follow the URL stored under a key of each item's info and merge the result
    Hydrate {
        /// Info key holding the secondary URL (defaults to [hydrate].key)
        #[arg(long)]
        key: Option<String>,
    },

    /// Store the URLs listed in a file without fetching anything
    AddUrls {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Show item statistics and exit
    Stats,

    /// Write stored items as JSON or JSON Lines
    Export {
        #[arg(long, default_value = "json")]
        format: ExportFormat,

        /// all, with-info or without-info
        #[arg(long, default_value = "all", value_parser = parse_filter)]
        filter: InfoFilter,

        /// Output file (stdout when omitted)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Delete every stored item
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn parse_filter(name: &str) -> Result<InfoFilter, String> {
    InfoFilter::from_name(name)
        .ok_or_else(|| format!("unknown filter '{}' (all, with-info, without-info)", name))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Check => handle_check(&config),
        Command::Stats => handle_stats(&config).await,
        Command::AddUrls { file } => handle_add_urls(&config, &file).await,
        Command::Export {
            format,
            filter,
            output,
        } => handle_export(&config, format, filter, output).await,
        Command::Clear { yes } => handle_clear(&config, yes).await,
        command => handle_pass(config, command).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagewalk=info,warn"),
            1 => EnvFilter::new("pagewalk=debug,info"),
            2 => EnvFilter::new("pagewalk=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `check`: shows the validated configuration
fn handle_check(config: &Config) -> anyhow::Result<()> {
    println!("=== Pagewalk Configuration ===\n");

    println!("Scraper:");
    match config.scraper.request_delay {
        Some(delay) => println!("  Request delay: {}s", delay),
        None => println!("  Request delay: none"),
    }
    println!("  Merge info: {}", config.scraper.merge_info);
    println!("  Fetcher: {}", config.scraper.fetcher);

    println!("\nDatabase:");
    println!("  Backend: {}", config.database.backend);
    if let Some(path) = &config.database.path {
        println!("  Path: {}", path);
    }
    println!("  Table: {}", config.database.table);

    if config.scraper.fetcher == "browser" {
        println!("\nBrowser:");
        println!("  Headless: {}", config.browser.headless);
        println!("  Profile: {}", config.browser.profile_name);
    }

    let extractors = SelectorRules::from_config(&config.extract)?.into_extractors();
    println!("\nExtractors:");
    println!("  Item URLs: {}", yes_no(extractors.has_item_urls()));
    println!("  URL+info pairs: {}", yes_no(extractors.has_item_urls_and_infos()));
    println!("  Next page: {}", yes_no(extractors.has_next_page()));
    println!("  Info: {}", yes_no(extractors.has_info()));
    match &config.hydrate {
        Some(hydrate) => println!("  Hydration key: {} ({} fields)", hydrate.key, hydrate.info.len()),
        None => println!("  Hydration: not configured"),
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

fn yes_no(configured: bool) -> &'static str {
    if configured {
        "configured"
    } else {
        "not configured"
    }
}

async fn open(config: &Config) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store = open_store(&config.database)
        .await
        .with_context(|| format!("opening {} store", config.database.backend))?;
    Ok(Arc::from(store))
}

/// Handles `stats`: shows item counts from the store
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let store = open(config).await?;
    let stats = load_statistics(store.as_ref()).await?;
    print_statistics(&stats);
    Ok(())
}

/// Handles `add-urls`: stores URLs from a file as bare items
async fn handle_add_urls(config: &Config, file: &Path) -> anyhow::Result<()> {
    let urls = load_seeds(file).with_context(|| format!("reading {}", file.display()))?;
    let store = open(config).await?;
    let inserted = store.upsert_urls(&urls).await?;
    println!("✓ {} URLs read, {} new items stored", urls.len(), inserted);
    Ok(())
}

/// Handles `export`: writes items to a file or stdout
async fn handle_export(
    config: &Config,
    format: ExportFormat,
    filter: InfoFilter,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = open(config).await?;
    let writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };

    let written = export_items(store.as_ref(), filter, format, writer).await?;
    if let Some(path) = output {
        println!("✓ {} items exported to: {}", written, path.display());
    }
    Ok(())
}

/// Handles `clear`: deletes every stored item
async fn handle_clear(config: &Config, yes: bool) -> anyhow::Result<()> {
    if !yes {
        bail!("refusing to delete every item without --yes");
    }
    let store = open(config).await?;
    let deleted = store.clear().await?;
    println!("✓ {} items deleted from {}", deleted, config.database.table);
    Ok(())
}

/// Handles the engine passes: opens the store and the fetch backend, runs the
/// pass, then releases the backend
async fn handle_pass(config: Config, command: Command) -> anyhow::Result<()> {
    let store = open(&config).await?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            interrupt.cancel();
        }
    });

    match config.scraper.fetcher.as_str() {
        "http" => {
            let fetcher = HttpFetcher::from_config(&config.scraper)?;
            run_pass(fetcher, store, &config, command, cancel).await
        }
        "browser" => run_browser_pass(store, &config, command, cancel).await,
        other => Err(ScrapeError::UnsupportedBackend(format!("fetcher '{}'", other)).into()),
    }
}

#[cfg(feature = "chrome")]
async fn run_browser_pass(
    store: Arc<dyn RecordStore>,
    config: &Config,
    command: Command,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    use pagewalk::crawler::{BrowserFetcher, ChromeSession};

    let session = ChromeSession::launch(&config.browser)
        .await
        .map_err(|e| ScrapeError::Session(e.to_string()))?;
    let fetcher = BrowserFetcher::new(session, &config.browser);
    run_pass(fetcher, store, config, command, cancel).await
}

#[cfg(not(feature = "chrome"))]
async fn run_browser_pass(
    _store: Arc<dyn RecordStore>,
    _config: &Config,
    _command: Command,
    _cancel: CancellationToken,
) -> anyhow::Result<()> {
    Err(ScrapeError::UnsupportedBackend(
        "fetcher 'browser' requires the chrome feature".to_string(),
    )
    .into())
}

/// Runs one engine pass over any backend producing `PageView`s
async fn run_pass<F>(
    fetcher: F,
    store: Arc<dyn RecordStore>,
    config: &Config,
    command: Command,
    cancel: CancellationToken,
) -> anyhow::Result<()>
where
    F: Fetcher<View = PageView, Control = ControlToken>,
{
    let extractors = SelectorRules::from_config(&config.extract)?.into_extractors();
    let mut scraper = Scraper::from_config(fetcher, store, &config.scraper)
        .with_extractors(extractors)
        .with_cancellation(cancel);

    let outcome = run_command(&mut scraper, config, command).await;
    scraper.shutdown().await;
    outcome
}

async fn run_command<F>(
    scraper: &mut Scraper<F>,
    config: &Config,
    command: Command,
) -> anyhow::Result<()>
where
    F: Fetcher<View = PageView, Control = ControlToken>,
{
    match command {
        Command::Urls { seeds_file, seeds } => {
            let mut all = match &seeds_file {
                Some(path) => {
                    load_seeds(path).with_context(|| format!("reading {}", path.display()))?
                }
                None => Vec::new(),
            };
            all.extend(seeds);
            if all.is_empty() {
                bail!("no seed URLs given (pass a SEEDS_FILE or --seed)");
            }

            let report = scraper.scrape_item_urls(&all).await?;
            println!("✓ Traversal: {}", report);
        }
        Command::Infos { refresh } => {
            let report = if refresh {
                scraper.refresh_item_infos().await?
            } else {
                scraper.scrape_item_infos().await?
            };
            println!("✓ Info: {}", report);
        }
        Command::Hydrate { key } => {
            let key = key
                .or_else(|| config.hydrate.as_ref().map(|h| h.key.clone()))
                .context("no hydration key (pass --key or set [hydrate].key)")?;
            let secondary = match &config.hydrate {
                Some(hydrate) => SelectorRules::for_hydration(hydrate)?.into_extractors(),
                None => Default::default(),
            };

            let report = scraper.hydrate(&key, &secondary).await?;
            println!("✓ Hydration: {}", report);
        }
        other => bail!("{:?} does not run an engine pass", other),
    }
    Ok(())
}
