//! Status and aggregate commands

use std::path::Path;

use anyhow::Result;
use billscan_core::db::Database;

use super::open_db;

pub fn cmd_stats(db: &Database) -> Result<()> {
    let stats = db.list_stats()?;

    if stats.is_empty() {
        println!("No aggregates recorded yet.");
        return Ok(());
    }

    println!();
    for stat in &stats {
        println!(
            "  📈 {:<20} {:>12.2}   (updated {})",
            stat.name,
            stat.count,
            stat.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();

    Ok(())
}

pub fn cmd_status(db_path: &Path, no_encrypt: bool) -> Result<()> {
    use billscan_core::analyzer::ANALYZER_ENV;
    use billscan_core::db::DB_KEY_ENV;
    use billscan_core::storage::{is_s3_backend, S3Config, STORE_DIR_ENV, STORE_ENV};

    println!();
    println!("📊 billscan Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = std::fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    // Pipeline configuration
    let store = std::env::var(STORE_ENV).unwrap_or_else(|_| "local".to_string());
    if is_s3_backend(&store) {
        let bucket = if S3Config::is_configured() {
            "configured"
        } else {
            "S3_BUCKET_NAME not set"
        };
        println!("   Store: s3 via {} ({})", store.trim().to_lowercase(), bucket);
    } else {
        let dir = std::env::var(STORE_DIR_ENV)
            .unwrap_or_else(|_| billscan_core::storage::DEFAULT_STORE_DIR.to_string());
        println!("   Store: local ({})", dir);
    }
    let analyzer = std::env::var(ANALYZER_ENV).unwrap_or_else(|_| "textract".to_string());
    println!("   Analyzer: {}", analyzer);

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                println!();
                println!("   Bills: {}", db.count_bills()?);
                for stat in db.list_stats()? {
                    println!("   Aggregate '{}': {:.2}", stat.name, stat.count);
                }
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
