//! Mock analyzer for testing
//!
//! Returns a canned analysis result without calling any provider.
//! Can be configured to fail, to fail a few times before succeeding, or to
//! stall so callers can exercise their timeout handling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::ExpenseAnalyzer;
use crate::error::{Error, Result};
use crate::models::{AnalysisResult, ExpenseDocument, ExpenseField, LineItem, LineItemGroup};

/// Mock expense analyzer
#[derive(Clone)]
pub struct MockAnalyzer {
    response: AnalysisResult,
    /// Calls that fail before the canned response is returned
    failures_remaining: Arc<AtomicUsize>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalyzer {
    /// Create a mock returning a small two-item receipt
    pub fn new() -> Self {
        Self::with_result(default_receipt())
    }

    /// Create a mock returning the given result
    pub fn with_result(response: AnalysisResult) -> Self {
        Self {
            response,
            failures_remaining: Arc::new(AtomicUsize::new(0)),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a mock that always fails
    pub fn failing() -> Self {
        Self::new().failing_times(usize::MAX)
    }

    /// Fail the next `n` calls, then succeed
    pub fn failing_times(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of analyze calls made so far (shared across clones)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExpenseAnalyzer for MockAnalyzer {
    async fn analyze_expense(&self, image: &[u8]) -> Result<AnalysisResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::Analysis(format!(
                "Mock analyzer failure ({} bytes)",
                image.len()
            )));
        }

        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn default_receipt() -> AnalysisResult {
    AnalysisResult::new(vec![ExpenseDocument::new(
        vec![
            ExpenseField::new("VENDOR_NAME", "Corner\nMarket"),
            ExpenseField::new("TOTAL", "$12.50"),
        ],
        vec![LineItemGroup::new(vec![
            LineItem::new(vec![
                ExpenseField::new("ITEM", "Coffee"),
                ExpenseField::new("PRICE", "4.50"),
                ExpenseField::new("QUANTITY", "1"),
            ]),
            LineItem::new(vec![
                ExpenseField::new("ITEM", "Bagel"),
                ExpenseField::new("PRICE", "4.00"),
                ExpenseField::new("QUANTITY", "2"),
            ]),
        ])],
    )])
}
