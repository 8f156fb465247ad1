//! Notification error triage

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use refdir_common::db::NotificationErrorRecord;
use serde::{Deserialize, Serialize};

use crate::db::notification_errors;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub resolved: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ErrorList {
    pub errors: Vec<NotificationErrorRecord>,
}

/// GET /notification-errors?resolved=false&limit=50
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<ErrorList>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let errors = notification_errors::list_errors(&state.db, params.resolved, limit).await?;
    Ok(Json(ErrorList { errors }))
}

/// POST /notification-errors/:id/resolve
pub async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if !notification_errors::resolve_error(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("notification error {}", id)));
    }
    tracing::info!(error_id = %id, "Notification error resolved");
    Ok(Json(serde_json::json!({ "id": id, "resolved": true })))
}

pub fn notification_error_routes() -> Router<AppState> {
    Router::new()
        .route("/notification-errors", get(list))
        .route("/notification-errors/:id/resolve", post(resolve))
}
