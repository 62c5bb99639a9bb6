//! falcon-post - Publish one message to every configured platform

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use clap::Parser;
use libfalcon::logging::LoggingConfig;
use libfalcon::{
    Config, DispatchResult, Dispatcher, FalconError, PlatformResult, PublishRequest, Result,
};

#[derive(Parser, Debug)]
#[command(name = "falcon-post")]
#[command(version, about = "Publish a message to Bluesky and Discord")]
#[command(long_about = r#"Publish one message to every configured platform at once.

EXAMPLES:
    # Post to every configured platform
    falcon-post "Markets open in 5 minutes"

    # Read the message from stdin
    echo "Hello from a pipe" | falcon-post

    # Only Discord, with an attached image
    falcon-post -t discord -i chart.png "Today's chart"

    # Render a stock alert
    falcon-post -m '{"source":"super-signal","ticker":"AAPL","risk_count":2}' "AAPL alert"

    # Machine-readable results
    falcon-post -f json "Hello" | jq '.results'

EXIT CODES:
    0 - Published to every target
    1 - At least one target failed, or configuration error
    2 - Authentication error
    3 - Invalid input (empty message, unknown target, no configured targets)
"#)]
struct Cli {
    /// Message to publish (reads from stdin if not provided)
    message: Option<String>,

    /// Target platform(s): bluesky, discord (repeatable or comma-separated)
    #[arg(short, long = "target", value_name = "PLATFORM", value_delimiter = ',')]
    targets: Vec<String>,

    /// Image file to attach
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Image URL to attach
    #[arg(long, value_name = "URL")]
    image_url: Option<String>,

    /// Message metadata as JSON (e.g. a stock alert)
    #[arg(short, long, value_name = "JSON")]
    metadata: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if std::env::var_os("FALCON_LOG_LEVEL").is_none() {
        logging.level = "warn".to_string();
    }
    logging.init();

    match run(cli).await {
        Ok(result) if result.overall_success => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<DispatchResult> {
    let text = match cli.message {
        Some(message) => message,
        None => read_stdin()?,
    };

    let mut request = PublishRequest::new(text);
    if !cli.targets.is_empty() {
        request = request.with_targets(cli.targets);
    }
    if let Some(path) = &cli.image {
        let data = std::fs::read(path).map_err(|e| {
            FalconError::InvalidInput(format!("Cannot read image {}: {}", path.display(), e))
        })?;
        request = request.with_image_data(data);
    }
    if let Some(url) = cli.image_url {
        request = request.with_image_url(url);
    }
    if let Some(raw) = &cli.metadata {
        let metadata = serde_json::from_str(raw)
            .map_err(|e| FalconError::InvalidInput(format!("Invalid metadata JSON: {}", e)))?;
        request = request.with_metadata(metadata);
    }

    let config = Config::load()?;
    let dispatcher = Dispatcher::from_config(&config)?;
    let result = dispatcher.dispatch(request).await?;

    print_result(&result, &cli.format)?;
    Ok(result)
}

fn read_stdin() -> Result<String> {
    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut buffer = String::new();
    stdin
        .read_to_string(&mut buffer)
        .map_err(|e| FalconError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
    Ok(buffer.trim_end_matches(['\n', '\r']).to_string())
}

fn print_result(result: &DispatchResult, format: &str) -> Result<()> {
    if format == "json" {
        let json = serde_json::to_string_pretty(result)
            .map_err(|e| FalconError::InvalidInput(format!("Cannot encode result: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    for (platform, outcome) in &result.per_target {
        match outcome {
            PlatformResult::Success { id } => println!("{}:{}", platform, id),
            PlatformResult::Failure {
                error_kind,
                message,
            } => eprintln!("Error: {}: [{}] {}", platform, error_kind, message),
        }
    }
    Ok(())
}
