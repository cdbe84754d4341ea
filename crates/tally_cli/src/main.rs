//! Tally CLI
//!
//! Command-line tools for the Tally offline queue.
//!
//! # Commands
//!
//! - `enqueue` - Queue a save, update or delete
//! - `count` - Show the number of pending operations
//! - `list` - Show pending operations in replay order
//! - `clear` - Discard every pending operation
//! - `replay` - Drain the queue into the local ledger
//! - `stats` - Summarize ledger transactions over a date range

mod commands;
mod ledger;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offline transaction queue tools.
#[derive(Parser)]
#[command(name = "tally")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long, default_value = ".tally")]
    data_dir: PathBuf,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue an operation for replay
    Enqueue {
        #[command(subcommand)]
        operation: EnqueueCommand,
    },

    /// Show the number of pending operations
    Count,

    /// Show pending operations in replay order
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Discard every pending operation
    Clear,

    /// Replay pending operations into the ledger
    Replay {
        /// Treat the network as down (nothing is replayed)
        #[arg(long)]
        offline: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Summarize ledger transactions over a date range
    Stats {
        /// Range name (today, week, month, year, all)
        #[arg(short, long, default_value = "month")]
        range: String,

        /// First day of a custom range (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day of a custom range (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum EnqueueCommand {
    /// Create a transaction
    Save(RecordArgs),
    /// Replace a transaction
    Update(RecordArgs),
    /// Delete a transaction
    Delete {
        /// Transaction id
        id: String,
    },
}

/// Fields of a transaction record.
#[derive(Args)]
pub struct RecordArgs {
    /// Transaction id
    #[arg(long)]
    pub id: String,

    /// What was sold or bought
    #[arg(long)]
    pub item: String,

    /// Total amount
    #[arg(long)]
    pub total: f64,

    /// sale or expense
    #[arg(long, default_value = "sale")]
    pub kind: String,

    /// Number of units
    #[arg(long, default_value = "1")]
    pub quantity: f64,

    /// Category label
    #[arg(long)]
    pub category: Option<String>,

    /// Day of the transaction (YYYY-MM-DD)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Free-form note
    #[arg(long)]
    pub note: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.data_dir.as_path();
    match cli.command {
        Commands::Enqueue { operation } => {
            let operation = match operation {
                EnqueueCommand::Save(args) => tally_core::Operation::Save(args.into_record()?),
                EnqueueCommand::Update(args) => {
                    tally_core::Operation::Update(args.into_record()?)
                }
                EnqueueCommand::Delete { id } => tally_core::Operation::Delete(id.into()),
            };
            commands::enqueue::run(path, operation)?;
        }
        Commands::Count => commands::queue::count(path)?,
        Commands::List { format } => commands::queue::list(path, &format)?,
        Commands::Clear => commands::queue::clear(path)?,
        Commands::Replay { offline, format } => {
            commands::replay::run(path, !offline, cli.verbose, &format)?;
        }
        Commands::Stats {
            range,
            from,
            to,
            format,
        } => {
            commands::stats::run(path, &range, from, to, &format)?;
        }
        Commands::Version => {
            println!("Tally CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
