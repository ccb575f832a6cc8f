//! Filmlist crawler main entry point
//!
//! This is the command-line interface of the broadcaster film list crawler.

use anyhow::{bail, Context};
use clap::Parser;
use filmlist_crawler::config::{load_config_with_hash, Config};
use filmlist_crawler::crawler::build_http_client;
use filmlist_crawler::output::{
    generate_markdown_summary, print_statistics, print_stored_statistics,
};
use filmlist_crawler::storage::{load_import, open_store, CatalogueStore, ImportLocation};
use filmlist_crawler::{CrawlManager, Source};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Filmlist crawler: builds one film list from many broadcaster catalogues
///
/// Crawls every configured source in parallel under per-source rate limits
/// and a global time limit, merges the results into a deduplicated list and
/// stores it in a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "filmlist-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A parallel broadcaster film list crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl only this source (e.g. "ard", "3sat")
    #[arg(long, value_name = "ID")]
    source: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics of the stored film list and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Do not merge the film list at the configured import path
    #[arg(long)]
    no_import: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let only = cli
        .source
        .as_deref()
        .map(str::parse::<Source>)
        .transpose()?;

    if cli.dry_run {
        handle_dry_run(&config, only)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(&config, &config_hash, only, !cli.no_import).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` takes precedence when set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "filmlist_crawler=info,warn",
            1 => "filmlist_crawler=debug,info",
            2 => "filmlist_crawler=trace,debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, only: Option<Source>) -> anyhow::Result<()> {
    println!("=== Filmlist Crawler Dry Run ===\n");

    let budget = config.budget();
    println!("Crawler Configuration:");
    println!("  Worker threads: {}", budget.worker_threads);
    match budget.time_limit {
        Some(limit) => println!("  Time limit: {} minutes", limit.as_secs() / 60),
        None => println!("  Time limit: none"),
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);
    if let Some(import) = &config.output.import_path {
        println!("  Import: {}", import);
    }

    let sources: Vec<_> = config
        .enabled_sources()?
        .into_iter()
        .filter(|(source, _)| only.map_or(true, |wanted| wanted == *source))
        .collect();
    if let Some(wanted) = only {
        if sources.is_empty() {
            bail!("source '{}' is not enabled in the configuration", wanted.id());
        }
    }

    println!("\nSources ({}):", sources.len());
    for (source, entry) in &sources {
        let limits = config.source_config(*source);
        println!(
            "  - {} ({} seeds, {} day templates, {} discovery stages)",
            source.name(),
            entry.seeds.len(),
            entry.date_seeds.len(),
            entry.discovery.len()
        );
        println!(
            "    {} units/task, {} req/s, {} subpages, days -{}/+{}",
            limits.split_threshold(),
            limits.max_requests_per_second,
            limits.max_subpages,
            limits.max_days_past,
            limits.max_days_future
        );
    }

    // Building the manager also checks every feed definition
    CrawlManager::from_config(config)?;

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics of the stored film list
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;

    let list = store.stored_list()?;
    let counts = store.count_films_by_source()?;
    print_stored_statistics(list.as_ref(), &counts);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    only: Option<Source>,
    import: bool,
) -> anyhow::Result<()> {
    let mut manager = CrawlManager::from_config(config)?;

    if import {
        if let Some(value) = config.output.import_path.as_deref() {
            let location = ImportLocation::parse(value)?;
            let client = build_http_client(&config.user_agent)?;
            let scratch = Path::new(&config.output.database_path).with_extension("import.db");

            // Import failures are logged and the crawl goes on
            match load_import(&location, &client, &scratch).await {
                Ok(Some(previous)) => {
                    manager.import_catalogue(&previous);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Could not import {}: {}", location, e),
            }
        }
    }

    match only {
        Some(source) => {
            let films = manager
                .run_one(source)
                .await
                .with_context(|| format!("source '{}' is not enabled in the configuration", source.id()))?;
            tracing::info!("{} crawler returned {} films", source.name(), films.len());
        }
        None => {
            manager.run_all().await;
        }
    }

    let mut stats = manager.statistics();
    stats.config_hash = Some(config_hash.to_string());

    let catalogue = manager.into_catalogue();
    let mut store = open_store(Path::new(&config.output.database_path))
        .with_context(|| format!("opening {}", config.output.database_path))?;
    store.save(&catalogue, Some(config_hash))?;

    generate_markdown_summary(&stats, Path::new(&config.output.summary_path))?;
    tracing::info!("Summary written to {}", config.output.summary_path);

    print_statistics(&stats);
    Ok(())
}
