//! Canned analysis responses and photos shared by tests across the workspace

use base64::Engine;

use crate::models::{AnalysisResult, ExpenseDocument, ExpenseField, LineItem, LineItemGroup};

/// Smallest byte sequence that looks like a JPEG (SOI + APP0 marker + EOI)
pub const SAMPLE_JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
    0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xD9,
];

/// Base64 of [`SAMPLE_JPEG`], as a client would upload it
pub fn sample_photo_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(SAMPLE_JPEG)
}

/// One-item diner receipt with a multi-line vendor name
pub fn joes_diner_analysis() -> AnalysisResult {
    AnalysisResult::new(vec![ExpenseDocument::new(
        vec![
            ExpenseField::new("VENDOR_NAME", "Joe's\nDiner"),
            ExpenseField::new("TOTAL", "45.00"),
        ],
        vec![LineItemGroup::new(vec![LineItem::new(vec![
            ExpenseField::new("ITEM", "Burger"),
            ExpenseField::new("PRICE", "10.00"),
            ExpenseField::new("QUANTITY", "2"),
        ])])],
    )])
}

/// The same receipt in the provider's JSON wire format
pub fn joes_diner_json() -> &'static str {
    r#"{
  "DocumentMetadata": { "Pages": 1 },
  "ExpenseDocuments": [
    {
      "ExpenseIndex": 1,
      "SummaryFields": [
        {
          "Type": { "Text": "VENDOR_NAME", "Confidence": 98.2 },
          "ValueDetection": { "Text": "Joe's\nDiner", "Confidence": 97.5 },
          "PageNumber": 1
        },
        {
          "Type": { "Text": "TOTAL", "Confidence": 99.0 },
          "LabelDetection": { "Text": "TOTAL", "Confidence": 99.0 },
          "ValueDetection": { "Text": "45.00", "Confidence": 99.3 },
          "PageNumber": 1
        }
      ],
      "LineItemGroups": [
        {
          "LineItemGroupIndex": 1,
          "LineItems": [
            {
              "LineItemExpenseFields": [
                { "Type": { "Text": "ITEM" }, "ValueDetection": { "Text": "Burger" } },
                { "Type": { "Text": "PRICE" }, "ValueDetection": { "Text": "10.00" } },
                { "Type": { "Text": "QUANTITY" }, "ValueDetection": { "Text": "2" } },
                { "Type": { "Text": "EXPENSE_ROW" }, "ValueDetection": { "Text": "Burger 2 10.00" } }
              ]
            }
          ]
        }
      ]
    }
  ]
}"#
}

/// A document with line items but no summary section
pub fn malformed_analysis() -> AnalysisResult {
    AnalysisResult::new(vec![ExpenseDocument {
        expense_index: Some(1),
        summary_fields: None,
        line_item_groups: Some(vec![]),
    }])
}
