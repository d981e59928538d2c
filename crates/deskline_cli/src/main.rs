//! Deskline CLI
//!
//! Operator tools for deskline record stores.
//!
//! # Commands
//!
//! - `inspect` - Display store statistics and sync backlog
//! - `queue` - Print the live queue projection
//! - `audit` - Print the audit log projection
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Deskline command-line store tools.
#[derive(Parser)]
#[command(name = "deskline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display store statistics and sync backlog
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the live queue (records awaiting fulfillment, FIFO)
    Queue {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the audit log (fulfilled records, ordered by label)
    Audit {
        /// Case-insensitive substring filter on the label
        #[arg(long)]
        filter: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Queue { format } => {
            let path = cli.path.ok_or("Store path required for queue")?;
            commands::queue::run(&path, &format)?;
        }
        Commands::Audit { filter, format } => {
            let path = cli.path.ok_or("Store path required for audit")?;
            commands::audit::run(&path, filter.as_deref(), &format)?;
        }
        Commands::Version => {
            println!("deskline CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
