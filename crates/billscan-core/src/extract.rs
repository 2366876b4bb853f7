//! Expense field extraction
//!
//! Walks an [`AnalysisResult`] and keeps only what billscan stores: the vendor
//! name, the printed total, and the item/price/quantity of every line item.
//!
//! Matching is on the provider's normalized type labels. For summary fields the
//! last match wins, across all documents in the result. Line items are emitted
//! in document → group → item order, one record per item even when only some of
//! its fields were recognized.
//!
//! Extraction is pure: no I/O, no shared state. On error nothing is returned,
//! so a caller never persists a half-read receipt.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{AnalysisResult, ExpenseField, LineItemRecord, SummaryRecord};

/// Summary field type for the merchant name
pub const VENDOR_NAME: &str = "VENDOR_NAME";
/// Summary field type for the amount due
pub const TOTAL: &str = "TOTAL";
/// Line item field type for the item description
pub const ITEM: &str = "ITEM";
/// Line item field type for the line price
pub const PRICE: &str = "PRICE";
/// Line item field type for the quantity
pub const QUANTITY: &str = "QUANTITY";

/// Extraction options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Replace newlines in item descriptions with spaces
    ///
    /// Vendor name and total are always normalized; prices and quantities
    /// never are.
    pub normalize_item_text: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            normalize_item_text: true,
        }
    }
}

/// Result of extracting one analysis result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub summary: SummaryRecord,
    pub items: Vec<LineItemRecord>,
}

/// Extract with default options
pub fn extract_expense(result: &AnalysisResult) -> Result<Extraction> {
    extract_expense_with(result, ExtractOptions::default())
}

/// Extract summary and line items from an analysis result
///
/// Fails with [`Error::MalformedInput`] when a document lacks `SummaryFields`
/// or `LineItemGroups`, a group lacks `LineItems`, an item lacks
/// `LineItemExpenseFields`, or a recognized field has no value text. Fields
/// without a type label are skipped like any other unrecognized type.
pub fn extract_expense_with(result: &AnalysisResult, options: ExtractOptions) -> Result<Extraction> {
    let mut summary = SummaryRecord::default();
    let mut items = Vec::new();

    for (doc_idx, document) in result.expense_documents.iter().enumerate() {
        let summary_fields = document.summary_fields.as_ref().ok_or_else(|| {
            Error::MalformedInput(format!("expense document {} has no SummaryFields", doc_idx))
        })?;
        let groups = document.line_item_groups.as_ref().ok_or_else(|| {
            Error::MalformedInput(format!("expense document {} has no LineItemGroups", doc_idx))
        })?;

        for field in summary_fields {
            match field.type_text() {
                Some(VENDOR_NAME) => {
                    summary.vendor_name = replace_newlines(required_value(field, doc_idx)?);
                }
                Some(TOTAL) => {
                    summary.total = replace_newlines(required_value(field, doc_idx)?);
                }
                _ => {}
            }
        }

        for (group_idx, group) in groups.iter().enumerate() {
            let line_items = group.line_items.as_ref().ok_or_else(|| {
                Error::MalformedInput(format!(
                    "line item group {} of document {} has no LineItems",
                    group_idx, doc_idx
                ))
            })?;

            for line_item in line_items {
                let fields = line_item.line_item_expense_fields.as_ref().ok_or_else(|| {
                    Error::MalformedInput(format!(
                        "line item in group {} of document {} has no LineItemExpenseFields",
                        group_idx, doc_idx
                    ))
                })?;
                items.push(extract_line_item(fields, doc_idx, options)?);
            }
        }
    }

    debug!(
        documents = result.expense_documents.len(),
        items = items.len(),
        vendor = %summary.vendor_name,
        "Extracted expense fields"
    );

    Ok(Extraction { summary, items })
}

fn extract_line_item(
    fields: &[ExpenseField],
    doc_idx: usize,
    options: ExtractOptions,
) -> Result<LineItemRecord> {
    let mut record = LineItemRecord::default();

    for field in fields {
        match field.type_text() {
            Some(ITEM) => {
                let value = required_value(field, doc_idx)?;
                record.item = Some(if options.normalize_item_text {
                    replace_newlines(value)
                } else {
                    value.to_string()
                });
            }
            Some(PRICE) => record.price = Some(required_value(field, doc_idx)?.to_string()),
            Some(QUANTITY) => record.quantity = Some(required_value(field, doc_idx)?.to_string()),
            _ => {}
        }
    }

    Ok(record)
}

fn required_value(field: &ExpenseField, doc_idx: usize) -> Result<&str> {
    field.value_text().ok_or_else(|| {
        Error::MalformedInput(format!(
            "{} field in document {} has no ValueDetection text",
            field.type_text().unwrap_or("untyped"),
            doc_idx
        ))
    })
}

/// Replace every `\n` with a single space
fn replace_newlines(text: &str) -> String {
    text.replace('\n', " ")
}
