//! Receipt upload handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{get_user_email, AppError, AppState, MAX_UPLOAD_SIZE};
use billscan_core::{AnalysisResult, LineItemRecord};

/// Upload request body
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// Base64 photo, optionally as a `data:image/...;base64,` URL
    pub photo: Option<String>,
}

/// Response for a successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub bill_id: String,
    pub image_key: String,
    pub vendor_name: String,
    pub total: String,
    pub items: Vec<LineItemRecord>,
    pub discount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
}

/// Read the JSON body and pull out the photo
async fn read_photo(request: Request) -> Result<String, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body or upload too large (max 50MB)"))?;

    let body: UploadRequest = serde_json::from_slice(&bytes)
        .map_err(|_| AppError::bad_request("Request body must be JSON with a \"photo\" field"))?;

    body.photo
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("No photo provided"))
}

/// POST /api/uploadAndAnalyse - Store, analyze and record a receipt photo
pub async fn upload_and_analyse(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<UploadResponse>, AppError> {
    let user_email = get_user_email(request.headers());
    let photo = read_photo(request).await?;

    let outcome = state.ingestor.ingest(&photo).await?;

    // The bill is already committed
    if let Err(e) = state.db.log_audit(
        &user_email,
        "upload",
        Some("bill"),
        Some(&outcome.bill_id),
        Some(&format!(
            "image={}, items={}",
            outcome.image_key,
            outcome.items.len()
        )),
    ) {
        warn!(bill_id = %outcome.bill_id, error = %e, "Failed to write audit entry");
    }

    info!(bill_id = %outcome.bill_id, user = %user_email, "Receipt uploaded");

    Ok(Json(UploadResponse {
        success: true,
        bill_id: outcome.bill_id,
        image_key: outcome.image_key,
        vendor_name: outcome.summary.vendor_name,
        total: outcome.summary.total,
        items: outcome.items,
        discount: outcome.discount,
        duplicate_of: outcome.duplicate_of,
    }))
}

/// POST /api/analyze - Return the raw analysis without storing a bill
pub async fn analyze_receipt(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<AnalysisResult>, AppError> {
    let user_email = get_user_email(request.headers());
    let photo = read_photo(request).await?;

    let analysis = state.ingestor.analyze_only(&photo).await?;

    state.db.log_audit(
        &user_email,
        "analyze",
        Some("receipt"),
        None,
        Some(&format!("documents={}", analysis.expense_documents.len())),
    )?;

    Ok(Json(analysis))
}
