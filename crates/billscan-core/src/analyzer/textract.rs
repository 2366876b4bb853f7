//! AWS Textract AnalyzeExpense backend
//!
//! Sends the image bytes inline (synchronous API, up to 10 MB for JPEG/PNG)
//! and converts the SDK response into [`AnalysisResult`].

use async_trait::async_trait;
use aws_sdk_textract::error::DisplayErrorContext;
use aws_sdk_textract::primitives::Blob;
use aws_sdk_textract::types as tx;
use tracing::{debug, info};

use super::ExpenseAnalyzer;
use crate::error::{Error, Result};
use crate::models::{
    AnalysisResult, ExpenseDocument, ExpenseField, FieldDetection, FieldLabel, GroupProperty,
    LineItem, LineItemGroup,
};

/// Textract-backed analyzer
#[derive(Clone)]
pub struct TextractAnalyzer {
    client: aws_sdk_textract::Client,
}

impl TextractAnalyzer {
    pub fn new(client: aws_sdk_textract::Client) -> Self {
        Self { client }
    }

    /// Build a client from the shared AWS configuration
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        info!(
            region = ?sdk_config.region().map(|r| r.as_ref().to_string()),
            "Using Textract analyzer"
        );
        Self::new(aws_sdk_textract::Client::new(&sdk_config))
    }
}

#[async_trait]
impl ExpenseAnalyzer for TextractAnalyzer {
    async fn analyze_expense(&self, image: &[u8]) -> Result<AnalysisResult> {
        let document = tx::Document::builder()
            .bytes(Blob::new(image.to_vec()))
            .build();

        let output = self
            .client
            .analyze_expense()
            .document(document)
            .send()
            .await
            .map_err(|e| Error::Analysis(format!("AnalyzeExpense failed: {}", DisplayErrorContext(&e))))?;

        let result = AnalysisResult::new(
            output
                .expense_documents
                .unwrap_or_default()
                .into_iter()
                .map(ExpenseDocument::from)
                .collect(),
        );

        debug!(
            documents = result.expense_documents.len(),
            "Textract analysis complete"
        );
        Ok(result)
    }

    fn name(&self) -> &str {
        "textract"
    }
}

impl From<tx::ExpenseDocument> for ExpenseDocument {
    fn from(doc: tx::ExpenseDocument) -> Self {
        Self {
            expense_index: doc.expense_index,
            summary_fields: doc
                .summary_fields
                .map(|fields| fields.into_iter().map(ExpenseField::from).collect()),
            line_item_groups: doc
                .line_item_groups
                .map(|groups| groups.into_iter().map(LineItemGroup::from).collect()),
        }
    }
}

impl From<tx::LineItemGroup> for LineItemGroup {
    fn from(group: tx::LineItemGroup) -> Self {
        Self {
            line_item_group_index: group.line_item_group_index,
            line_items: group.line_items.map(|items| {
                items
                    .into_iter()
                    .map(|item| LineItem {
                        line_item_expense_fields: item
                            .line_item_expense_fields
                            .map(|fields| fields.into_iter().map(ExpenseField::from).collect()),
                    })
                    .collect()
            }),
        }
    }
}

impl From<tx::ExpenseField> for ExpenseField {
    fn from(field: tx::ExpenseField) -> Self {
        Self {
            field_type: field.r#type.map(|t| FieldLabel {
                text: t.text,
                confidence: t.confidence,
            }),
            label_detection: field.label_detection.map(detection),
            value_detection: field.value_detection.map(detection),
            page_number: field.page_number,
            group_properties: field.group_properties.map(|props| {
                props
                    .into_iter()
                    .map(|p| GroupProperty {
                        types: p.types,
                        id: p.id,
                    })
                    .collect()
            }),
        }
    }
}

fn detection(d: tx::ExpenseDetection) -> FieldDetection {
    FieldDetection {
        text: d.text,
        confidence: d.confidence,
    }
}
