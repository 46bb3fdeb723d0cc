//! csfloat-sniper - CSFloat listing monitor
//!
//! Sends a push notification for every new listing priced below its
//! reference value by at least the configured discount.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use csfloat_sniper::adapters::cli::{CheckCmd, CleanupCmd, CliApp, Command, RunCmd, StatsCmd};
use csfloat_sniper::adapters::csfloat::{CsfloatClient, CsfloatConfig};
use csfloat_sniper::adapters::ntfy::{NtfyConfig, NtfyNotifier};
use csfloat_sniper::adapters::sqlite::SqliteSeenStore;
use csfloat_sniper::application::{DedupStore, MonitorOrchestrator, OrchestratorConfig};
use csfloat_sniper::config::{load_config, Config};
use csfloat_sniper::domain::{DealDecision, DealDetector};
use csfloat_sniper::ports::{ListingSource, PageRequest, SeenStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in the TOML file)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    let config_path = match &app.command {
        Command::Run(cmd) => &cmd.config,
        Command::Check(cmd) => &cmd.config,
        Command::Cleanup(cmd) => &cmd.config,
        Command::Stats(cmd) => &cmd.config,
    };
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Run(cmd) => run_command(cmd, config).await,
        Command::Check(cmd) => check_command(cmd, config).await,
        Command::Cleanup(cmd) => cleanup_command(cmd, config),
        Command::Stats(cmd) => stats_command(cmd, config),
    }
}

/// RUST_LOG wins, then the CLI flags, then the config level
fn init_logging(verbose: bool, debug: bool, config_level: &str) -> Result<()> {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        config_level
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

fn open_store(config: &Config) -> Result<SqliteSeenStore> {
    let db_path = config.storage.get_db_path();
    SqliteSeenStore::open(Path::new(&db_path))
        .with_context(|| format!("Failed to open seen-listing store at {}", db_path))
}

async fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    tracing::info!("Starting csfloat-sniper...");

    let store = open_store(&config)?;
    let dedup = DedupStore::with_window(store, config.storage.build_window());

    let client = CsfloatClient::with_config(CsfloatConfig::from(&config))
        .context("Failed to create CSFloat client")?;
    if client.config().api_key.is_none() {
        tracing::warn!("No API key configured - requests are unauthenticated");
    }

    let mut ntfy_config = NtfyConfig::from(&config);
    if cmd.dry_run && ntfy_config.topic.is_empty() {
        ntfy_config.topic = "dry-run".to_string();
    }
    let notifier = NtfyNotifier::with_config(ntfy_config)
        .context("Failed to create ntfy notifier (set [notify] topic or NTFY_TOPIC)")?;

    let orch_config = OrchestratorConfig {
        dry_run: cmd.dry_run,
        ..OrchestratorConfig::from(&config)
    };

    let orchestrator = MonitorOrchestrator::with_dedup(orch_config, client, dedup, notifier)
        .context("Failed to create orchestrator")?;

    // Setup Ctrl+C handler
    let orch = orchestrator.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        orch.stop().await;
    });

    if cmd.dry_run {
        tracing::warn!("DRY RUN - deals are logged, no notifications sent");
    }

    orchestrator.run().await?;
    tracing::info!("csfloat-sniper stopped");
    Ok(())
}

async fn check_command(cmd: CheckCmd, config: Config) -> Result<()> {
    let client = CsfloatClient::with_config(CsfloatConfig::from(&config))
        .context("Failed to create CSFloat client")?;
    let orch_config = OrchestratorConfig::from(&config);
    let detector = DealDetector::new(orch_config.min_discount_fraction);

    let limit = cmd.limit.unwrap_or(config.polling.rate.max_page_size);
    let request = PageRequest {
        sort_by: orch_config.sort_by.clone(),
        limit,
        listing_type: orch_config.listing_type.clone(),
        min_price: orch_config.min_price_cents,
    };

    let page = client
        .fetch_page(&request)
        .await
        .context("Failed to fetch listings")?;

    println!("Fetched {} listings (rate limit remaining: {})", page.listings.len(), page.rate.remaining);

    let mut deals = 0;
    for listing in &page.listings {
        if let DealDecision::Deal { discount_pct, .. } = detector.evaluate(listing) {
            deals += 1;
            println!(
                "  {:>5.1}% off  ${:>9.2}  {}  {}",
                discount_pct,
                listing.price_major(),
                listing.item.market_hash_name,
                listing.url()
            );
        }
    }
    println!("{} deals at >= {:.1}% discount", deals, detector.min_discount_fraction() * 100.0);

    Ok(())
}

fn cleanup_command(cmd: CleanupCmd, config: Config) -> Result<()> {
    let days = cmd.days.unwrap_or(config.storage.retention_days).max(1);
    let mut dedup = DedupStore::new(open_store(&config)?);

    let deleted = dedup.cleanup(days).context("Retention sweep failed")?;
    println!("Deleted {} rows older than {} days", deleted, days);
    Ok(())
}

fn stats_command(_cmd: StatsCmd, config: Config) -> Result<()> {
    let store = open_store(&config)?;
    let stats = store.stats().context("Failed to read store stats")?;

    println!("Store:    {}", store.path());
    println!("Seen:     {}", stats.total);
    println!("Notified: {}", stats.notified);
    Ok(())
}
