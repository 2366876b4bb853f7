//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// billscan - Extract vendor, total and line items from receipt photos
#[derive(Parser)]
#[command(name = "billscan")]
#[command(about = "Receipt analysis service and tools", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "billscan.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set BILLSCAN_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on (falls back to $PORT, then 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires an API key or a trusted network.
        #[arg(long)]
        no_auth: bool,
    },

    /// Extract fields from a saved analysis response (JSON file)
    Extract {
        /// Analysis response file ("-" for stdin)
        #[arg(short, long)]
        file: PathBuf,

        /// Also derive the discount from the total
        #[arg(long)]
        discount: bool,

        /// Keep newlines in item descriptions
        #[arg(long)]
        raw_items: bool,
    },

    /// Stored bills
    Bills {
        #[command(subcommand)]
        action: Option<BillsAction>,
    },

    /// Show running aggregates
    Stats,

    /// Show database and pipeline status
    Status,
}

#[derive(Subcommand)]
pub enum BillsAction {
    /// List bills, newest first
    List {
        /// Maximum number of bills to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show one bill with its line items
    Show {
        /// Bill ID
        id: String,
    },

    /// Delete a bill (the aggregate is not adjusted)
    Delete {
        /// Bill ID
        id: String,
    },
}
