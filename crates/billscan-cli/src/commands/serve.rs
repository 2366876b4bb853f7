//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use billscan_core::{AnalyzerClient, ExpenseAnalyzer, IngestConfig, Ingestor};

use super::open_db;

/// Port used when neither --port nor $PORT is set
pub const DEFAULT_PORT: u16 = 3000;

/// Resolve the listen port: flag, then $PORT, then the default
pub fn resolve_port(flag: Option<u16>) -> u16 {
    flag.or_else(|| std::env::var("PORT").ok().and_then(|p| p.trim().parse().ok()))
        .unwrap_or(DEFAULT_PORT)
}

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: Option<u16>,
    no_auth: bool,
    no_encrypt: bool,
) -> Result<()> {
    let port = resolve_port(port);
    let config = billscan_server::ServerConfig::from_env(!no_auth);

    println!("🚀 Starting billscan server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!(
            "   🔑 API keys: {} configured (BILLSCAN_API_KEYS)",
            config.api_keys.len()
        );
        if !config.trusted_networks.is_empty() {
            println!(
                "   🏠 Trusted networks: {} (BILLSCAN_TRUSTED_NETWORKS)",
                config
                    .trusted_networks
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }

    let db = open_db(db_path, no_encrypt)?;

    let store = billscan_core::storage::from_env()
        .await
        .context("Failed to set up object store")?;
    let analyzer = AnalyzerClient::from_env().await;
    let ingest_config = IngestConfig::from_env();

    println!("   Store: {}", store.name());
    println!("   Analyzer: {}", analyzer.name());
    println!(
        "   Analysis: {}s timeout, {} attempt(s), discount tracking {}",
        ingest_config.analysis_timeout.as_secs(),
        ingest_config.analysis_attempts,
        if ingest_config.track_discount { "on" } else { "off" }
    );
    println!();
    println!("   Press Ctrl+C to stop");

    let ingestor = Ingestor::new(db.clone(), store, analyzer, ingest_config);
    billscan_server::serve_with_config(db, ingestor, host, port, config).await?;

    Ok(())
}
