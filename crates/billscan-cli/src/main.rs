//! billscan CLI - Receipt analysis service
//!
//! Usage:
//!   billscan init                    Initialize database
//!   billscan serve --port 3000       Start web server
//!   billscan extract --file r.json   Extract fields from a saved analysis
//!   billscan bills list              List stored bills

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
        Commands::Extract {
            file,
            discount,
            raw_items,
        } => commands::cmd_extract(&file, discount, raw_items),
        Commands::Bills { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => commands::cmd_bills_list(&db, 20),
                Some(BillsAction::List { limit }) => commands::cmd_bills_list(&db, limit),
                Some(BillsAction::Show { id }) => commands::cmd_bills_show(&db, &id),
                Some(BillsAction::Delete { id }) => {
                    let store = billscan_core::storage::from_env()
                        .await
                        .context("Failed to set up object store")?;
                    commands::cmd_bills_delete(&db, store.as_ref(), &id).await
                }
            }
        }
        Commands::Stats => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_stats(&db)
        }
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
    }
}
