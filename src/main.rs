//! Void Ledger CLI
//!
//! Operator tool for appending to, reading and auditing a void ledger file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use void_ledger::{Ledger, LedgerConfig, TipCache};

#[derive(Parser)]
#[command(name = "void-ledger")]
#[command(about = "Tamper-evident hash-chained JSONL ledger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ledger file (overrides configuration)
    #[arg(short, long)]
    ledger: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Append a genesis entry if the ledger is empty
    Init,

    /// Append one event
    Append {
        /// Event type tag (request, response, error, ...)
        #[arg(short = 't', long = "type")]
        event_type: String,

        /// Payload as a JSON object
        #[arg(short, long, default_value = "{}")]
        data: String,
    },

    /// Verify the full hash chain
    Verify,

    /// Print entries, one JSON object per line
    Read {
        /// Only the last N entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print the current chain tip
    Tip,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "void_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = LedgerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.ledger {
        config.ledger_path = path;
    }

    let ledger = Ledger::from_config(&config)?;
    let tip_cache = config.tip_cache_path.clone().map(TipCache::new);

    match cli.command {
        Commands::Init => match ledger.init_genesis()? {
            Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
            None => info!("Ledger {:?} already initialized", ledger.path()),
        },

        Commands::Append { event_type, data } => {
            let payload: serde_json::Value =
                serde_json::from_str(&data).context("Payload is not valid JSON")?;

            let entry = match &tip_cache {
                Some(cache) => cache.append(&ledger, &event_type, payload)?,
                None => ledger.append(&event_type, payload)?,
            };
            println!("{}", serde_json::to_string(&entry)?);
        }

        Commands::Verify => {
            let result = ledger
                .verify()
                .with_context(|| format!("Failed to read ledger {:?}", ledger.path()))?;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.is_valid {
                error!("{}", result.summary());
                std::process::exit(1);
            }
        }

        Commands::Read { limit } => {
            for entry in ledger.read(limit)? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }

        Commands::Tip => {
            let tip = match &tip_cache {
                Some(cache) => cache.resolve_tip(&ledger),
                None => ledger.latest_hash(),
            };
            println!("{}", tip);
        }
    }

    Ok(())
}
