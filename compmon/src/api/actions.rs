//! Actions forwarded to the engine

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use compmon_common::events::CompmonEvent;

use crate::error::ApiResult;
use crate::model::ClipId;
use crate::AppState;

/// POST /clips/:id/trigger
///
/// 204 once the remote accepted the trigger; 502 when it rejected it or
/// could not be reached. An accepted trigger schedules an immediate update
/// cycle so the new active clip shows up without waiting for the next tick.
pub async fn trigger_clip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let clip_id = ClipId::new(id);
    let result = state.trigger.trigger(&clip_id).await;

    state.event_bus.emit_lossy(CompmonEvent::ClipTriggered {
        clip_id: clip_id.to_string(),
        success: result.is_ok(),
        timestamp: Utc::now(),
    });

    result?;
    state.scheduler.request_refresh();
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct DiscoverResponse {
    /// False when a rediscovery was already pending
    pub scheduled: bool,
}

/// POST /discover
pub async fn request_discovery(State(state): State<AppState>) -> (StatusCode, Json<DiscoverResponse>) {
    let scheduled = state.scheduler.request_rediscovery();
    tracing::debug!(scheduled, "Rediscovery requested");
    (StatusCode::ACCEPTED, Json(DiscoverResponse { scheduled }))
}

/// Build action routes
pub fn action_routes() -> Router<AppState> {
    Router::new()
        .route("/clips/:id/trigger", post(trigger_clip))
        .route("/discover", post(request_discovery))
}
