//! Pluggable expense analysis backends
//!
//! # Architecture
//!
//! - `ExpenseAnalyzer` trait: runs document analysis on receipt image bytes
//! - `AnalyzerClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `TextractAnalyzer`, `MockAnalyzer`
//!
//! # Configuration
//!
//! Environment variables:
//! - `BILLSCAN_ANALYZER`: Backend to use (textract, mock). Default: textract
//! - Standard AWS variables (`AWS_REGION`, credentials) for textract

mod mock;
mod textract;

pub use mock::MockAnalyzer;
pub use textract::TextractAnalyzer;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::AnalysisResult;

/// Environment variable selecting the analyzer backend
pub const ANALYZER_ENV: &str = "BILLSCAN_ANALYZER";

/// Trait defining the interface for expense analysis backends
#[async_trait]
pub trait ExpenseAnalyzer: Send + Sync {
    /// Analyze a receipt image and return the structured expense result
    async fn analyze_expense(&self, image: &[u8]) -> Result<AnalysisResult>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}

/// Concrete analyzer client enum
#[derive(Clone)]
pub enum AnalyzerClient {
    /// AWS Textract AnalyzeExpense
    Textract(TextractAnalyzer),
    /// Canned responses for testing and local development
    Mock(MockAnalyzer),
}

impl AnalyzerClient {
    /// Create an analyzer from environment variables
    ///
    /// Checks `BILLSCAN_ANALYZER` to determine which backend to use:
    /// - `textract` (default): loads the shared AWS configuration
    /// - `mock`: returns the default canned receipt
    pub async fn from_env() -> Self {
        let backend = std::env::var(ANALYZER_ENV).unwrap_or_else(|_| "textract".to_string());

        match backend.to_lowercase().as_str() {
            "textract" => AnalyzerClient::Textract(TextractAnalyzer::from_env().await),
            "mock" => AnalyzerClient::mock(),
            _ => {
                tracing::warn!(backend = %backend, "Unknown BILLSCAN_ANALYZER, falling back to textract");
                AnalyzerClient::Textract(TextractAnalyzer::from_env().await)
            }
        }
    }

    /// Create a mock analyzer with the default canned receipt
    pub fn mock() -> Self {
        AnalyzerClient::Mock(MockAnalyzer::new())
    }
}

#[async_trait]
impl ExpenseAnalyzer for AnalyzerClient {
    async fn analyze_expense(&self, image: &[u8]) -> Result<AnalysisResult> {
        match self {
            AnalyzerClient::Textract(a) => a.analyze_expense(image).await,
            AnalyzerClient::Mock(a) => a.analyze_expense(image).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            AnalyzerClient::Textract(a) => a.name(),
            AnalyzerClient::Mock(a) => a.name(),
        }
    }
}

impl From<MockAnalyzer> for AnalyzerClient {
    fn from(mock: MockAnalyzer) -> Self {
        AnalyzerClient::Mock(mock)
    }
}
