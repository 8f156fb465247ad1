//! Request-created trigger
//!
//! The mini-app backend calls this once per newly inserted order or
//! question. The pass runs to completion in a spawned task even when the
//! caller goes away; a caller that waits gets the report back.

use axum::{extract::State, routing::post, Json, Router};
use refdir_common::db::RequestKind;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::requests::load_request;
use crate::error::{ApiError, ApiResult};
use crate::services::FanOutReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RequestCreated {
    pub kind: RequestKind,
    pub id: String,
}

/// POST /events/request-created
pub async fn request_created(
    State(state): State<AppState>,
    Json(body): Json<RequestCreated>,
) -> ApiResult<Json<FanOutReport>> {
    let id = body.id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("Request id is empty".to_string()));
    }

    let request = load_request(&state.db, body.kind, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {}", body.kind, id)))?;

    // The pass runs in its own task so a dropped connection cannot stop it
    // between partners
    let engine = Arc::clone(&state.engine);
    let pass = tokio::spawn(async move { engine.on_request_created(&request).await });
    let report = pass.await.map_err(|e| {
        tracing::error!(kind = %body.kind, request_id = %id, error = %e, "Fan-out task failed");
        ApiError::Internal(format!("Fan-out task for {} {} failed", body.kind, id))
    })?;

    Ok(Json(report))
}

pub fn request_routes() -> Router<AppState> {
    Router::new().route("/events/request-created", post(request_created))
}
