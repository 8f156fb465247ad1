//! Channel publication endpoints
//!
//! Called by the moderation flow (approve, profile edit, archive).

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::error::ApiResult;
use crate::services::PublicationOutcome;
use crate::AppState;

/// POST /partners/:id/publish
pub async fn publish(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> ApiResult<Json<PublicationOutcome>> {
    Ok(Json(state.publisher.publish_partner(&partner_id).await?))
}

/// POST /partners/:id/update-post
pub async fn update_post(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> ApiResult<Json<PublicationOutcome>> {
    Ok(Json(state.publisher.update_partner_post(&partner_id).await?))
}

/// POST /partners/:id/delete-post
pub async fn delete_post(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> ApiResult<Json<PublicationOutcome>> {
    Ok(Json(state.publisher.delete_partner_post(&partner_id).await?))
}

pub fn partner_routes() -> Router<AppState> {
    Router::new()
        .route("/partners/:id/publish", post(publish))
        .route("/partners/:id/update-post", post(update_post))
        .route("/partners/:id/delete-post", post(delete_post))
}
