//! Data models for billscan
//!
//! Two families of types live here:
//! - The expense analysis payload, mirroring the provider's JSON shape
//!   (`ExpenseDocuments[].SummaryFields[].Type.Text` and friends) so saved
//!   responses can be replayed from disk.
//! - The flat records produced by extraction and persisted as bills.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default vendor name when no `VENDOR_NAME` field is found
pub const DEFAULT_VENDOR_NAME: &str = "N/A";

/// Default total when no `TOTAL` field is found (a digit string, not a number)
pub const DEFAULT_TOTAL: &str = "0";

/// Name of the running discount aggregate
pub const DISCOUNT_STAT: &str = "stats";

// ============================================================================
// Analysis payload
// ============================================================================

/// Full response of an expense analysis call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalysisResult {
    /// One entry per receipt/invoice detected in the image
    #[serde(default)]
    pub expense_documents: Vec<ExpenseDocument>,
}

impl AnalysisResult {
    pub fn new(expense_documents: Vec<ExpenseDocument>) -> Self {
        Self { expense_documents }
    }
}

/// A single receipt or invoice within an analysis result
///
/// `summary_fields` and `line_item_groups` are optional on the wire; the
/// extractor rejects documents where either is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expense_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_fields: Option<Vec<ExpenseField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_groups: Option<Vec<LineItemGroup>>,
}

impl ExpenseDocument {
    pub fn new(summary_fields: Vec<ExpenseField>, line_item_groups: Vec<LineItemGroup>) -> Self {
        Self {
            expense_index: None,
            summary_fields: Some(summary_fields),
            line_item_groups: Some(line_item_groups),
        }
    }
}

/// A typed field, used both for document summaries and line items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpenseField {
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_detection: Option<FieldDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_detection: Option<FieldDetection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_properties: Option<Vec<GroupProperty>>,
}

impl ExpenseField {
    /// Build a field with a type label and a detected value
    pub fn new(type_text: &str, value_text: &str) -> Self {
        Self {
            field_type: Some(FieldLabel {
                text: Some(type_text.to_string()),
                confidence: None,
            }),
            value_detection: Some(FieldDetection {
                text: Some(value_text.to_string()),
                confidence: None,
            }),
            ..Default::default()
        }
    }

    /// Normalized type label, e.g. `VENDOR_NAME`
    pub fn type_text(&self) -> Option<&str> {
        self.field_type.as_ref().and_then(|t| t.text.as_deref())
    }

    /// Detected value text, possibly containing newlines
    pub fn value_text(&self) -> Option<&str> {
        self.value_detection.as_ref().and_then(|v| v.text.as_deref())
    }

    /// All group types across the field's group properties
    pub fn group_types(&self) -> Vec<&str> {
        self.group_properties
            .iter()
            .flatten()
            .flat_map(|g| g.types.iter().flatten())
            .map(String::as_str)
            .collect()
    }
}

/// Normalized field type as reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldLabel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Text detected on the document for a label or value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldDetection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupProperty {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineItemGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_group_index: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<LineItem>>,
}

impl LineItemGroup {
    pub fn new(line_items: Vec<LineItem>) -> Self {
        Self {
            line_item_group_index: None,
            line_items: Some(line_items),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_expense_fields: Option<Vec<ExpenseField>>,
}

impl LineItem {
    pub fn new(fields: Vec<ExpenseField>) -> Self {
        Self {
            line_item_expense_fields: Some(fields),
        }
    }
}

// ============================================================================
// Extraction output
// ============================================================================

/// Flat summary of an analyzed receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub vendor_name: String,
    /// Total as printed on the receipt (e.g. "$45.00"), not parsed
    pub total: String,
}

impl Default for SummaryRecord {
    fn default() -> Self {
        Self {
            vendor_name: DEFAULT_VENDOR_NAME.to_string(),
            total: DEFAULT_TOTAL.to_string(),
        }
    }
}

/// One line of a receipt
///
/// Keys are only present when the matching field type was seen. Consumers
/// must treat a missing key as unknown, not as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
}

impl LineItemRecord {
    /// True when no recognized field was present
    pub fn is_empty(&self) -> bool {
        self.item.is_none() && self.price.is_none() && self.quantity.is_none()
    }
}

// ============================================================================
// Persisted records
// ============================================================================

/// A stored bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    /// Random UUID key
    pub id: String,
    pub vendor_name: String,
    pub items: Vec<LineItemRecord>,
    pub total: String,
    /// When the receipt was ingested
    pub date: DateTime<Utc>,
    /// Object store key of the source image
    pub image_key: Option<String>,
    /// SHA-256 of the source image bytes
    pub content_hash: Option<String>,
    /// Discount added to the running aggregate for this bill, if any
    pub discount: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a bill
#[derive(Debug, Clone)]
pub struct NewBill {
    pub vendor_name: String,
    pub items: Vec<LineItemRecord>,
    pub total: String,
    pub date: DateTime<Utc>,
    pub image_key: Option<String>,
    pub content_hash: Option<String>,
    pub discount: Option<f64>,
}

impl NewBill {
    /// Bill for an extracted summary, dated now
    pub fn from_summary(summary: &SummaryRecord, items: Vec<LineItemRecord>) -> Self {
        Self {
            vendor_name: summary.vendor_name.clone(),
            items,
            total: summary.total.clone(),
            date: Utc::now(),
            image_key: None,
            content_hash: None,
            discount: None,
        }
    }
}

/// A named running aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stat {
    pub name: String,
    pub count: f64,
    pub updated_at: DateTime<Utc>,
}
