//! Graphite band command line client
//!
//! Runs single-window and band queries against a Graphite render API and
//! prints the grouped result as JSON.
//!
//! # Configuration
//!
//! Settings come from, in increasing precedence:
//! 1. Built-in defaults
//! 2. The TOML file given with `--config` (or `GRAPHITE_BAND_CONFIG`)
//! 3. `GRAPHITE_*` environment variables
//! 4. `--url` on the command line
//!
//! # Example Usage
//!
//! ```bash
//! # Last hour of idle CPU, grouped by host
//! graphite-band query 'servers.*.cpu.idle' --start 1h --format '.host..'
//!
//! # Same hour of the day over the last 7 days
//! graphite-band band 'servers.*.cpu.idle' --duration 1h --period 1d --num 7 --format '.host..'
//!
//! # Which tag keys a format groups by
//! graphite-band tag-keys '.host..metric'
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use graphite_band::{config::Config, AuditLog, QueryEngine, ResultSet};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "graphite-band")]
#[command(version, about = "Windowed queries against the Graphite render API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "GRAPHITE_BAND_CONFIG")]
    config: Option<PathBuf>,

    /// Override the Graphite base URL
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Include the issued render requests in the output
    #[arg(long, global = true)]
    show_requests: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Query one window ending `end` before now
    Query {
        /// Graphite target expression
        target: String,

        /// How far back the window starts (e.g. 1h, 30m)
        #[arg(short, long)]
        start: String,

        /// How far back the window ends; now if omitted
        #[arg(short, long, default_value = "")]
        end: String,

        /// Tag format mapping path nodes to tag keys
        #[arg(short, long, default_value = "")]
        format: String,
    },

    /// Query `num` windows of one length, each one period further back
    Band {
        /// Graphite target expression
        target: String,

        /// Window length
        #[arg(short, long)]
        duration: String,

        /// Step between consecutive window ends
        #[arg(short, long)]
        period: String,

        /// Number of windows (1-100)
        #[arg(short, long)]
        num: i64,

        /// Tag format mapping path nodes to tag keys
        #[arg(short, long, default_value = "")]
        format: String,
    },

    /// Print the tag keys a format groups by
    TagKeys {
        /// Tag format
        format: String,
    },
}

/// JSON document written to stdout
#[derive(Serialize)]
struct Output<'a> {
    result: &'a ResultSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    requests: Option<&'a AuditLog>,
}

/// Load configuration from file and environment, then apply CLI overrides
fn load_config(cli: &Cli) -> graphite_band::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file_with_env(path)?,
        None => Config::from_env(),
    };
    if let Some(url) = &cli.url {
        config.transport.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_result(
    result: &ResultSet,
    audit: &AuditLog,
    show_requests: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = Output {
        result,
        requests: show_requests.then_some(audit),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Commands::TagKeys { format } = &cli.command {
        let keys: Vec<String> = QueryEngine::tag_keys(format).into_iter().collect();
        println!("{}", serde_json::to_string(&keys)?);
        return Ok(());
    }

    let config = load_config(&cli)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    debug!(
        "Configuration: base_url={}, timeout_secs={}, cache_enabled={}",
        config.transport.base_url, config.transport.timeout_secs, config.cache.enabled
    );

    let engine = QueryEngine::from_config(&config)?;
    let mut audit = AuditLog::new();

    let result = match &cli.command {
        Commands::Query {
            target,
            start,
            end,
            format,
        } => engine.query(target, start, end, format, &mut audit).await?,
        Commands::Band {
            target,
            duration,
            period,
            num,
            format,
        } => {
            engine
                .band(target, duration, period, format, *num, &mut audit)
                .await?
        }
        Commands::TagKeys { .. } => return Ok(()),
    };

    info!(
        requests = audit.len(),
        series = result.len(),
        "Query finished"
    );
    print_result(&result, &audit, cli.show_requests)
}
