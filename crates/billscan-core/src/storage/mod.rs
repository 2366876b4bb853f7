//! Receipt photo storage with pluggable backends
//!
//! # Architecture
//!
//! - `ObjectStore` trait defines the interface for storage backends
//! - `LocalStore` keeps objects as files in a local directory
//! - `S3Store` talks to any S3-compatible bucket (AWS, R2, MinIO)
//!
//! # Configuration
//!
//! - `BILLSCAN_STORE`: Backend to use (local, s3). Default: local
//! - `BILLSCAN_STORE_DIR`: Directory for the local backend (default: receipts)
//! - `S3_BUCKET_NAME`, `S3_ENDPOINT`: see [`S3Config`]

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};

mod local;
mod s3;

pub use local::LocalStore;
pub use s3::{S3Config, S3Store, S3_BUCKET_ENV, S3_ENDPOINT_ENV};

/// Environment variable selecting the storage backend
pub const STORE_ENV: &str = "BILLSCAN_STORE";
/// Environment variable for the local backend directory
pub const STORE_DIR_ENV: &str = "BILLSCAN_STORE_DIR";
/// Default directory for the local backend
pub const DEFAULT_STORE_DIR: &str = "receipts";

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Human-readable name for this backend
    fn name(&self) -> &str;

    /// Store an object under `key`, replacing any existing one
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch the bytes stored under `key`
    ///
    /// Returns `Error::NotFound` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the object under `key` (missing keys are not an error)
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Reject keys that could escape a flat namespace
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains("..")
        || key.contains('\0')
    {
        return Err(Error::InvalidData(format!("Invalid object key: {:?}", key)));
    }
    Ok(())
}

/// Whether a `BILLSCAN_STORE` value selects the S3-compatible backend
pub fn is_s3_backend(backend: &str) -> bool {
    matches!(backend.trim().to_lowercase().as_str(), "s3" | "r2")
}

/// Build the configured object store from environment variables
///
/// `BILLSCAN_STORE=s3` (or `r2`) requires `S3_BUCKET_NAME`; anything else
/// falls back to a local directory.
pub async fn from_env() -> Result<Arc<dyn ObjectStore>> {
    let backend = std::env::var(STORE_ENV).unwrap_or_else(|_| "local".to_string());

    if is_s3_backend(&backend) {
        let config = S3Config::from_env()?;
        return Ok(Arc::new(S3Store::connect(config).await));
    }

    if !backend.trim().eq_ignore_ascii_case("local") {
        tracing::warn!(backend = %backend, "Unknown BILLSCAN_STORE, falling back to local");
    }
    let dir = std::env::var(STORE_DIR_ENV).unwrap_or_else(|_| DEFAULT_STORE_DIR.to_string());
    Ok(Arc::new(LocalStore::new(dir)?))
}
