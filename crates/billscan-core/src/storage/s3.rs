//! S3-compatible object store
//!
//! Works against AWS S3 and S3-compatible services (Cloudflare R2, MinIO).
//!
//! # Configuration
//!
//! - `S3_BUCKET_NAME` - bucket holding receipt photos (required)
//! - `S3_ENDPOINT` - custom endpoint URL for R2/MinIO (optional)
//!
//! Region and credentials come from the standard AWS environment
//! (`AWS_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, profiles).

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use super::{validate_key, ObjectStore};
use crate::error::{Error, Result};

/// Environment variable names for S3 configuration
pub const S3_BUCKET_ENV: &str = "S3_BUCKET_NAME";
pub const S3_ENDPOINT_ENV: &str = "S3_ENDPOINT";

/// S3 configuration
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
}

impl S3Config {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let bucket = std::env::var(S3_BUCKET_ENV).map_err(|_| {
            Error::Storage(format!("{} environment variable not set", S3_BUCKET_ENV))
        })?;

        let endpoint = std::env::var(S3_ENDPOINT_ENV)
            .ok()
            .filter(|e| !e.trim().is_empty());

        Ok(Self { bucket, endpoint })
    }

    /// Check if S3 is configured (bucket name is set)
    pub fn is_configured() -> bool {
        std::env::var(S3_BUCKET_ENV).is_ok()
    }
}

/// Object store backed by an S3 bucket
pub struct S3Store {
    client: aws_sdk_s3::Client,
    config: S3Config,
}

impl S3Store {
    /// Build a client from the shared AWS configuration
    pub async fn connect(config: S3Config) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            // R2 and MinIO need path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            config,
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        validate_key(key)?;
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "Failed to upload {} to {}: {}",
                    key,
                    self.config.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!(key, bucket = %self.config.bucket, size, "Uploaded object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        validate_key(key)?;

        let output = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                    Error::NotFound(format!("Object {}", key))
                } else {
                    Error::Storage(format!(
                        "Failed to fetch {} from {}: {}",
                        key,
                        self.config.bucket,
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Storage(format!("Failed to read body of {}: {}", key, e)))?;

        Ok(data.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "Failed to delete {} from {}: {}",
                    key,
                    self.config.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }
}
