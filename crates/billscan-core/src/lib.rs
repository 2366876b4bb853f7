//! billscan Core Library
//!
//! Shared functionality for the billscan receipt service:
//! - Expense analysis data model (provider JSON shape)
//! - Field extraction and discount derivation
//! - Bill store with connection pooling and migrations
//! - Pluggable object stores (local directory, S3-compatible)
//! - Pluggable expense analyzers (AWS Textract, mock)
//! - Ingest pipeline tying the pieces together

pub mod analyzer;
pub mod db;
pub mod discount;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod storage;

/// Test utilities including canned analysis responses
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analyzer::{AnalyzerClient, ExpenseAnalyzer, MockAnalyzer, TextractAnalyzer};
pub use db::{AuditEntry, Database};
pub use discount::{derive_discount, parse_total_amount, DISCOUNT_RATE};
pub use error::{Error, Result};
pub use extract::{extract_expense, extract_expense_with, ExtractOptions, Extraction};
pub use ingest::{delete_bill_and_photo, IngestConfig, IngestOutcome, Ingestor};
pub use models::{AnalysisResult, Bill, LineItemRecord, NewBill, Stat, SummaryRecord};
pub use storage::{LocalStore, ObjectStore, S3Config, S3Store};
