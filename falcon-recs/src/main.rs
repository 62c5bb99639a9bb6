//! falcon-recs - Publish filtered stock recommendations to Discord
//!
//! Polls the Falcon recommendations endpoint, keeps tickers with enough
//! relative volume and volume, and posts each one to Discord once.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use libfalcon::config::parse_duration;
use libfalcon::logging::LoggingConfig;
use libfalcon::recommendations::{
    format_volume, FilterPolicy, FinvizChecker, PostedTickers, RecommendationsFetcher,
    RecommendationsScheduler,
};
use libfalcon::{Config, Dispatcher};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "falcon-recs")]
#[command(version, about = "Publish filtered stock recommendations to Discord")]
#[command(long_about = "\
falcon-recs - Publish filtered stock recommendations to Discord

DESCRIPTION:
    Fetches recommendations from the Falcon endpoint, checks relative
    volume (RVOL) and volume on Finviz, and posts each passing ticker to
    Discord. Posted tickers are remembered so nothing is announced twice.

USAGE:
    # Preview without posting
    falcon-recs --once --dry-run

    # Post once and exit
    falcon-recs --once

    # Poll every minute with a stricter RVOL filter
    falcon-recs --interval 60 --min-rvol 2.5

    # Inspect or reset the posted-tickers history
    falcon-recs --show-history
    falcon-recs --clear-history

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown

EXIT CODES:
    0 - Success
    1 - Configuration or runtime error
")]
struct Cli {
    /// Fetch and post once, then exit
    #[arg(long)]
    once: bool,

    /// Fetch and display without posting to Discord
    #[arg(long)]
    dry_run: bool,

    /// Poll interval, seconds or a duration like 5m (overrides config)
    #[arg(short, long, value_name = "INTERVAL", value_parser = parse_interval)]
    interval: Option<Duration>,

    /// Recommendations endpoint URL (overrides config)
    #[arg(short, long, value_name = "URL")]
    endpoint: Option<String>,

    /// Minimum relative volume to post
    #[arg(long, value_name = "RVOL")]
    min_rvol: Option<f64>,

    /// Minimum volume to post
    #[arg(long, value_name = "SHARES")]
    min_volume: Option<u64>,

    /// Post without checking RVOL and volume
    #[arg(long)]
    no_rvol_check: bool,

    /// Do not remember posted tickers
    #[arg(long)]
    no_tracking: bool,

    /// List previously posted tickers
    #[arg(long)]
    show_history: bool,

    /// Forget all previously posted tickers
    #[arg(long)]
    clear_history: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_interval(value: &str) -> std::result::Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    LoggingConfig::from_env(cli.verbose || config.server.debug).init();

    if let Some(endpoint) = &cli.endpoint {
        config.recommendations.endpoint_url = Some(endpoint.clone());
    }
    if let Some(interval) = cli.interval {
        config.recommendations.poll_interval = interval;
    }

    if cli.show_history || cli.clear_history {
        return history(&cli, &config).await;
    }

    let recs = &config.recommendations;
    if recs.endpoint_url.as_deref().map_or(true, |url| url.trim().is_empty()) {
        eprintln!("Error: Falcon endpoint not configured.");
        eprintln!("Set FALCON_ENDPOINT_URL or use --endpoint option.");
        std::process::exit(1);
    }
    if !cli.dry_run && !config.discord.is_configured() {
        eprintln!("Error: Discord not configured.");
        eprintln!("Set FALCON_DISCORD_WEBHOOK_URL or use --dry-run option.");
        std::process::exit(1);
    }

    let policy = FilterPolicy {
        min_rvol: cli.min_rvol.unwrap_or(recs.min_rvol),
        min_volume: cli.min_volume.unwrap_or(recs.min_volume),
        check_metrics: !cli.no_rvol_check,
    };

    let fetcher = RecommendationsFetcher::from_config(recs)?;
    let dispatcher = Dispatcher::from_config(&config)?;
    let mut scheduler =
        RecommendationsScheduler::new(Arc::new(fetcher), Arc::new(dispatcher), policy)
            .with_poll_interval(recs.poll_interval);

    if policy.check_metrics {
        scheduler = scheduler.with_metrics(Arc::new(FinvizChecker::new()?));
    }
    if !cli.no_tracking {
        let tracker = PostedTickers::open(&recs.tracker_path)
            .await
            .context("Failed to open posted-tickers history")?;
        scheduler = scheduler.with_tracker(tracker);
    }

    if cli.dry_run {
        let entries = scheduler.preview().await?;
        println!(
            "Found {} recommendations (min RVOL: {}):\n",
            entries.len(),
            policy.min_rvol
        );
        for (i, entry) in entries.iter().enumerate() {
            println!("--- {}/{} [{}] ---", i + 1, entries.len(), entry.verdict.label());
            println!("{}", entry.message);
            println!();
        }
        return Ok(());
    }

    if cli.once {
        let summary = scheduler.run_once().await?;
        println!(
            "Posted {}/{} recommendations to Discord (RVOL >= {})",
            summary.posted, summary.total, policy.min_rvol
        );
        return Ok(());
    }

    println!("Starting recommendations scheduler");
    println!(
        "  Interval: {}",
        humantime::format_duration(scheduler.poll_interval())
    );
    println!("  Min RVOL: {}", policy.min_rvol);
    println!("  Min Volume: {}", format_volume(policy.min_volume));
    println!("  RVOL check: {}", enabled(policy.check_metrics));
    println!("  Tracking: {}", enabled(!cli.no_tracking));
    println!("Press Ctrl+C to stop");

    scheduler.run(shutdown_signal()).await;
    Ok(())
}

async fn history(cli: &Cli, config: &Config) -> Result<()> {
    let tracker = PostedTickers::open(&config.recommendations.tracker_path)
        .await
        .context("Failed to open posted-tickers history")?;

    if cli.show_history {
        let posted = tracker.list().await?;
        if posted.is_empty() {
            println!("No posted tickers in history.");
        } else {
            println!("Posted tickers ({}):\n", posted.len());
            for item in &posted {
                let rvol = item
                    .rvol
                    .map(|r| format!("{:.2}", r))
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "  {:6} | RVOL: {:>5} | {:<10} | {}",
                    item.ticker,
                    rvol,
                    item.theme.as_deref().unwrap_or(""),
                    item.posted_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
    }

    if cli.clear_history {
        let count = tracker.clear(None).await?;
        println!("Cleared {} tickers from history.", count);
    }

    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

/// Resolves on the first SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() {
    use futures::stream::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    match Signals::new([SIGINT, SIGTERM]) {
        Ok(mut signals) => {
            if let Some(signal) = signals.next().await {
                info!("Received signal {}, stopping scheduler...", signal);
            }
        }
        Err(e) => {
            warn!("Signal setup failed ({}), falling back to Ctrl-C", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl-C, stopping scheduler...");
}
