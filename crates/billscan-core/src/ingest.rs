//! Receipt ingest pipeline
//!
//! `Ingestor::ingest` takes a base64 photo through every step:
//! decode, store the image, read it back, analyze it, extract the fields,
//! derive the discount, then persist the bill and bump the running aggregate
//! in one transaction. Nothing is written to the database until extraction
//! has succeeded, and the stored photo is removed again if a later step fails.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analyzer::{AnalyzerClient, ExpenseAnalyzer};
use crate::db::Database;
use crate::discount::derive_discount;
use crate::error::{Error, Result};
use crate::extract::{extract_expense_with, ExtractOptions, Extraction};
use crate::models::{AnalysisResult, LineItemRecord, NewBill, SummaryRecord, DISCOUNT_STAT};
use crate::storage::ObjectStore;

/// Content type recorded for uploaded photos
pub const PHOTO_CONTENT_TYPE: &str = "image/jpeg";

/// Ingest pipeline settings
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Upper bound for a single analyze call
    pub analysis_timeout: Duration,
    /// Total analyze attempts (at least 1)
    pub analysis_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`
    pub retry_backoff: Duration,
    /// Derive the discount and add it to the `stats` aggregate
    pub track_discount: bool,
    /// Replace newlines in item descriptions
    pub normalize_items: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(60),
            analysis_attempts: 2,
            retry_backoff: Duration::from_millis(500),
            track_discount: true,
            normalize_items: true,
        }
    }
}

impl IngestConfig {
    /// Load settings from environment variables
    ///
    /// - `BILLSCAN_ANALYSIS_TIMEOUT_SECS` (default 60)
    /// - `BILLSCAN_ANALYSIS_ATTEMPTS` (default 2)
    /// - `BILLSCAN_TRACK_DISCOUNT` (default true)
    /// - `BILLSCAN_NORMALIZE_ITEMS` (default true)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let analysis_timeout = std::env::var("BILLSCAN_ANALYSIS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.analysis_timeout);

        let analysis_attempts = std::env::var("BILLSCAN_ANALYSIS_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .map(|n| n.max(1))
            .unwrap_or(defaults.analysis_attempts);

        Self {
            analysis_timeout,
            analysis_attempts,
            retry_backoff: defaults.retry_backoff,
            track_discount: env_flag("BILLSCAN_TRACK_DISCOUNT", defaults.track_discount),
            normalize_items: env_flag("BILLSCAN_NORMALIZE_ITEMS", defaults.normalize_items),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) => match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// What an ingest stored and returned
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub bill_id: String,
    pub image_key: String,
    pub summary: SummaryRecord,
    pub items: Vec<LineItemRecord>,
    /// Amount added to the `stats` aggregate, if one was derived
    pub discount: Option<f64>,
    /// Most recent earlier bill made from the same photo bytes
    pub duplicate_of: Option<String>,
}

/// Runs the receipt pipeline against a bill store, an object store and an analyzer
#[derive(Clone)]
pub struct Ingestor {
    db: Database,
    store: Arc<dyn ObjectStore>,
    analyzer: AnalyzerClient,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        analyzer: AnalyzerClient,
        config: IngestConfig,
    ) -> Self {
        Self {
            db,
            store,
            analyzer,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Name of the configured object store backend
    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// Name of the configured analyzer backend
    pub fn analyzer_name(&self) -> &str {
        self.analyzer.name()
    }

    /// Analyze a base64 photo, store it as a bill and update the aggregate
    pub async fn ingest(&self, photo_base64: &str) -> Result<IngestOutcome> {
        let (image_key, content_hash, analysis) = self.store_and_analyze(photo_base64).await?;

        let options = ExtractOptions {
            normalize_item_text: self.config.normalize_items,
        };
        let result = extract_expense_with(&analysis, options)
            .and_then(|extraction| self.persist(extraction, &image_key, content_hash));

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.discard_photo(&image_key).await;
                Err(e)
            }
        }
    }

    /// Store and analyze a photo without extracting or persisting anything
    pub async fn analyze_only(&self, photo_base64: &str) -> Result<AnalysisResult> {
        let (_, _, analysis) = self.store_and_analyze(photo_base64).await?;
        Ok(analysis)
    }

    /// Delete a bill and its stored photo; returns false if the bill did not exist
    pub async fn delete_bill(&self, id: &str) -> Result<bool> {
        delete_bill_and_photo(&self.db, self.store.as_ref(), id).await
    }

    fn persist(
        &self,
        extraction: Extraction,
        image_key: &str,
        content_hash: String,
    ) -> Result<IngestOutcome> {
        let discount = if self.config.track_discount {
            match derive_discount(&extraction.summary.total) {
                Ok(d) => Some(d),
                Err(
                    e @ (Error::NoNumericTotal(_)
                    | Error::NegativeTotal(_)
                    | Error::TotalOutOfRange(_)),
                ) => {
                    warn!(image_key = %image_key, error = %e, "Skipping discount aggregate");
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let duplicate_of = self
            .db
            .get_bills_by_hash(&content_hash)?
            .into_iter()
            .next()
            .map(|bill| bill.id);
        if let Some(earlier) = &duplicate_of {
            info!(image_key = %image_key, earlier = %earlier, "Photo was ingested before");
        }

        let mut bill = NewBill::from_summary(&extraction.summary, extraction.items.clone());
        bill.image_key = Some(image_key.to_string());
        bill.content_hash = Some(content_hash);
        bill.discount = discount;

        let (bill_id, total) = self.db.record_bill(&bill, DISCOUNT_STAT)?;
        if let (Some(amount), Some(total)) = (discount, total) {
            info!(bill_id = %bill_id, amount, total, "Updated discount aggregate");
        }

        info!(
            bill_id = %bill_id,
            vendor = %extraction.summary.vendor_name,
            items = extraction.items.len(),
            "Ingested receipt"
        );

        Ok(IngestOutcome {
            bill_id,
            image_key: image_key.to_string(),
            summary: extraction.summary,
            items: extraction.items,
            discount,
            duplicate_of,
        })
    }

    async fn store_and_analyze(&self, photo_base64: &str) -> Result<(String, String, AnalysisResult)> {
        let bytes = decode_photo(photo_base64)?;

        let image_key = format!("{}.jpg", Uuid::new_v4());
        let content_hash = format!("{:x}", Sha256::digest(&bytes));

        self.store
            .put(&image_key, bytes, PHOTO_CONTENT_TYPE)
            .await?;
        info!(key = %image_key, store = self.store.name(), "Stored receipt photo");

        // Analyze what the store holds, not the request buffer
        let analysis = match self.store.get(&image_key).await {
            Ok(stored) => self.analyze_with_retry(&stored).await,
            Err(e) => Err(e),
        };

        match analysis {
            Ok(analysis) => Ok((image_key, content_hash, analysis)),
            Err(e) => {
                self.discard_photo(&image_key).await;
                Err(e)
            }
        }
    }

    async fn discard_photo(&self, image_key: &str) {
        if let Err(e) = self.store.delete(image_key).await {
            warn!(key = %image_key, error = %e, "Failed to remove receipt photo");
        }
    }

    async fn analyze_with_retry(&self, image: &[u8]) -> Result<AnalysisResult> {
        let attempts = self.config.analysis_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.retry_backoff * (attempt - 1)).await;
            }

            let result = tokio::time::timeout(
                self.config.analysis_timeout,
                self.analyzer.analyze_expense(image),
            )
            .await;

            let err = match result {
                Ok(Ok(analysis)) => return Ok(analysis),
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout(format!(
                    "analysis exceeded {}s",
                    self.config.analysis_timeout.as_secs_f64()
                )),
            };

            warn!(
                attempt,
                attempts,
                analyzer = self.analyzer.name(),
                error = %err,
                "Expense analysis failed"
            );
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| Error::Analysis("no analysis attempts made".to_string())))
    }
}

/// Delete a bill, then its photo from the object store
///
/// A photo that cannot be removed is logged and left behind; the bill is gone
/// either way. Returns false if the bill did not exist.
pub async fn delete_bill_and_photo(db: &Database, store: &dyn ObjectStore, id: &str) -> Result<bool> {
    let Some(bill) = db.get_bill(id)? else {
        return Ok(false);
    };

    if !db.delete_bill(id)? {
        return Ok(false);
    }

    if let Some(key) = &bill.image_key {
        if let Err(e) = store.delete(key).await {
            warn!(bill_id = %id, key = %key, error = %e, "Failed to remove receipt photo");
        }
    }

    info!(bill_id = %id, "Deleted bill");
    Ok(true)
}

/// Decode a base64 photo, tolerating a `data:...;base64,` prefix and whitespace
pub fn decode_photo(photo_base64: &str) -> Result<Vec<u8>> {
    let trimmed = photo_base64.trim();
    let payload = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(Error::InvalidData("photo is empty".to_string()));
    }

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::InvalidData(format!("photo is not valid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(Error::InvalidData("photo is empty".to_string()));
    }

    Ok(bytes)
}
