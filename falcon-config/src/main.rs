//! falcon-config - Show configuration and which publishers are ready

use clap::Parser;
use libfalcon::config::resolve_config_path;
use libfalcon::{Config, PlatformId, Result};

#[derive(Parser, Debug)]
#[command(name = "falcon-config")]
#[command(version, about = "Show Falcon Messenger configuration")]
#[command(long_about = r#"Show Falcon Messenger configuration.

Without flags, prints the server settings, configured targets and the
recommendations endpoint. Credentials are never printed.

EXAMPLES:
    falcon-config
    falcon-config --check

EXIT CODES:
    0 - Success
    1 - No publisher configured (with --check) or configuration error
"#)]
struct Cli {
    /// Report which publishers are configured; fails when none are
    #[arg(long)]
    check: bool,
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Returns `false` when `--check` found nothing to publish to
fn run(cli: &Cli) -> Result<bool> {
    let config = Config::load()?;
    let targets = target_list(&config);

    if cli.check {
        println!("Configuration Status:");
        println!("  Bluesky: {}", status(config.bluesky.is_configured()));
        println!("  Discord: {}", status(config.discord.is_configured()));
        println!(
            "  Falcon Endpoint: {}",
            status(config.recommendations.endpoint_url.is_some())
        );
        println!();
        println!("Configured targets: {}", targets);

        if config.configured_targets().is_empty() {
            println!();
            println!("No publishers configured. Set environment variables:");
            println!("  FALCON_BLUESKY_HANDLE and FALCON_BLUESKY_APP_PASSWORD");
            println!("  FALCON_DISCORD_WEBHOOK_URL");
            println!("  FALCON_ENDPOINT_URL (for recommendations)");
            return Ok(false);
        }
        return Ok(true);
    }

    if let Ok(path) = resolve_config_path() {
        let note = if path.exists() { "" } else { " (not found, using defaults)" };
        println!("Config file: {}{}", path.display(), note);
        println!();
    }

    println!("Server Configuration:");
    println!("  Host: {}", config.server.host);
    println!("  Port: {}", config.server.port);
    println!("  Debug: {}", config.server.debug);
    println!();
    println!("Configured targets: {}", targets);

    if let Some(url) = &config.recommendations.endpoint_url {
        let recs = &config.recommendations;
        println!();
        println!("Falcon Endpoint:");
        println!("  URL: {}", url);
        println!(
            "  Poll Interval: {}",
            humantime::format_duration(recs.poll_interval)
        );
        println!("  Verify SSL: {}", recs.verify_ssl);
        println!("  Min RVOL: {}", recs.min_rvol);
        println!("  Min Volume: {}", recs.min_volume);
        println!("  History: {}", config.tracker_path().display());
    }

    Ok(true)
}

fn status(configured: bool) -> &'static str {
    if configured {
        "Configured"
    } else {
        "Not configured"
    }
}

fn target_list(config: &Config) -> String {
    let targets: Vec<&str> = config
        .configured_targets()
        .into_iter()
        .map(|id: PlatformId| id.as_str())
        .collect();

    if targets.is_empty() {
        "none".to_string()
    } else {
        targets.join(", ")
    }
}
