//! Running aggregate handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};

use crate::{get_user_email, AppError, AppState};
use billscan_core::Stat;

/// GET /api/stats - List all aggregates
pub async fn list_stats(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<Stat>>, AppError> {
    let user_email = get_user_email(request.headers());
    let stats = state.db.list_stats()?;

    state
        .db
        .log_audit(&user_email, "list", Some("stats"), None, None)?;

    Ok(Json(stats))
}

/// GET /api/stats/:name - Get one aggregate
pub async fn get_stat(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    request: Request,
) -> Result<Json<Stat>, AppError> {
    let user_email = get_user_email(request.headers());

    let stat = state
        .db
        .get_stat(&name)?
        .ok_or_else(|| AppError::not_found("Stat not found"))?;

    state
        .db
        .log_audit(&user_email, "view", Some("stats"), Some(&name), None)?;

    Ok(Json(stat))
}
