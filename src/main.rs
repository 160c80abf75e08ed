//! lendflow-audit - inspect and verify a ledger directory

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use lendflow::{all_valid, format_records, format_summary, summarize};
use lendflow_ledger::{validate_channel, FileLedger, Ledger};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lendflow-audit", about = "Inspect and verify Lendflow hash-chained ledgers")]
struct Cli {
    /// Ledger directory holding <channel>.json files
    #[arg(short, long, default_value = "ledger", global = true)]
    ledger_dir: PathBuf,

    /// Print JSON instead of text
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List channels
    Channels,
    /// Print the records of one channel
    Show {
        channel: String,
        /// Don't truncate payloads
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Recompute hash chains; exits 1 if any chain is broken
    Verify { channel: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lendflow=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if !cli.ledger_dir.is_dir() {
        bail!("ledger directory not found: {}", cli.ledger_dir.display());
    }
    let ledger = FileLedger::open(&cli.ledger_dir)?;

    match cli.command {
        Command::Channels => {
            let channels = ledger.channels().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&channels)?);
            } else {
                for channel in channels {
                    println!("{}", channel);
                }
            }
        }

        Command::Show { channel, raw } => {
            validate_channel(&channel)?;
            let records = ledger
                .read(&channel)
                .await
                .with_context(|| format!("reading {}", channel))?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print!("{}", format_records(&channel, &records, raw));
            }
        }

        Command::Verify { channel } => {
            if let Some(channel) = &channel {
                validate_channel(channel)?;
            }
            let summaries = summarize(&ledger, channel.as_deref()).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                print!("{}", format_summary(&summaries));
            }
            if !all_valid(&summaries) {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
