//! Error types for billscan

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The analysis response is missing structure the extractor relies on
    #[error("Malformed analysis result: {0}")]
    MalformedInput(String),

    /// Discount derivation found no number in the total text
    #[error("No numeric value in total: {0:?}")]
    NoNumericTotal(String),

    /// Discount derivation found a negative total
    #[error("Negative total: {0}")]
    NegativeTotal(f64),

    /// The total's number does not fit a finite amount
    #[error("Total out of range: {0:?}")]
    TotalOutOfRange(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, Error>;
