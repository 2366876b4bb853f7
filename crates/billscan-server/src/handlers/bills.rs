//! Bill handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Json,
};
use serde::Deserialize;

use crate::{get_user_email, AppError, AppState, SuccessResponse, MAX_PAGE_LIMIT};
use billscan_core::Bill;

/// Query parameters for listing bills
#[derive(Debug, Deserialize)]
pub struct ListBillsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/bills - List bills, newest first
pub async fn list_bills(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListBillsQuery>,
    request: Request,
) -> Result<Json<Vec<Bill>>, AppError> {
    let user_email = get_user_email(request.headers());
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    let bills = state.db.list_bills(limit, offset)?;

    state.db.log_audit(
        &user_email,
        "list",
        Some("bill"),
        None,
        Some(&format!("limit={}, offset={}, count={}", limit, offset, bills.len())),
    )?;

    Ok(Json(bills))
}

/// GET /api/bills/:id - Get a single bill
pub async fn get_bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<Bill>, AppError> {
    let user_email = get_user_email(request.headers());

    let bill = state
        .db
        .get_bill(&id)?
        .ok_or_else(|| AppError::not_found("Bill not found"))?;

    state
        .db
        .log_audit(&user_email, "view", Some("bill"), Some(&id), None)?;

    Ok(Json(bill))
}

/// DELETE /api/bills/:id - Delete a bill and its photo (the aggregate is left unchanged)
pub async fn delete_bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_email = get_user_email(request.headers());

    if !state.ingestor.delete_bill(&id).await? {
        return Err(AppError::not_found("Bill not found"));
    }

    state
        .db
        .log_audit(&user_email, "delete", Some("bill"), Some(&id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}
