//! Snapshot projections
//!
//! Every handler reads the snapshot published by the scheduler; nothing here
//! talks to the remote.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::model::{ClipSlot, LayerId, LayerState};
use crate::services::Snapshot;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CompositionResponse {
    pub name: String,
    pub layers: Vec<LayerEntry>,
}

#[derive(Debug, Serialize)]
pub struct LayerEntry {
    pub id: LayerId,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LayerResponse {
    pub id: LayerId,
    pub name: String,
    #[serde(flatten)]
    pub state: LayerState,
}

/// GET /composition
///
/// Known layers in discovery order. Available before the first successful
/// cycle; the list is empty until discovery has run.
pub async fn get_composition(State(state): State<AppState>) -> Json<CompositionResponse> {
    let snapshot = state.scheduler.snapshot();
    let layers = snapshot
        .layer_map
        .iter()
        .map(|(id, name)| LayerEntry {
            id: id.clone(),
            name: name.clone(),
        })
        .collect();

    Json(CompositionResponse {
        name: snapshot.composition_name,
        layers,
    })
}

/// GET /layers/:id
pub async fn get_layer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<LayerResponse>> {
    let snapshot = state.scheduler.snapshot();
    let layer_id = LayerId::new(id);

    let name = snapshot
        .layer_map
        .get(&layer_id)
        .ok_or_else(|| ApiError::NotFound(format!("layer {}", layer_id)))?
        .clone();
    let layer_state = snapshot
        .layers
        .get(&layer_id)
        .ok_or_else(|| ApiError::NotFound(format!("layer {} has not been polled yet", layer_id)))?
        .clone();

    Ok(Json(LayerResponse {
        id: layer_id,
        name,
        state: layer_state,
    }))
}

/// GET /state
///
/// 503 until the first cycle succeeds.
pub async fn get_state(State(state): State<AppState>) -> ApiResult<Json<Snapshot>> {
    ready_snapshot(&state).map(Json)
}

/// Clip slot as served, flagged when it holds its layer's active clip
#[derive(Debug, Serialize)]
pub struct ClipSlotView {
    #[serde(flatten)]
    pub slot: ClipSlot,
    pub is_active: bool,
}

impl ClipSlotView {
    fn new(slot: ClipSlot, snapshot: &Snapshot) -> Self {
        let is_active = match (&slot.clip_id, snapshot.layers.get(&slot.layer_id)) {
            (Some(clip_id), Some(layer)) => layer.active_clip_id.as_ref() == Some(clip_id),
            _ => false,
        };
        Self { slot, is_active }
    }
}

#[derive(Debug, Serialize)]
pub struct ClipsResponse {
    pub clips: Vec<ClipSlotView>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ClipsResponse {
    fn from_slots(snapshot: &Snapshot, slots: impl IntoIterator<Item = ClipSlot>) -> Self {
        Self {
            clips: slots
                .into_iter()
                .map(|slot| ClipSlotView::new(slot, snapshot))
                .collect(),
            updated_at: snapshot.updated_at,
        }
    }
}

/// GET /clips
pub async fn get_clips(State(state): State<AppState>) -> ApiResult<Json<ClipsResponse>> {
    let snapshot = ready_snapshot(&state)?;
    let slots = snapshot.clip_slots.clone();
    Ok(Json(ClipsResponse::from_slots(&snapshot, slots)))
}

/// GET /layers/:id/clips
pub async fn get_layer_clips(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ClipsResponse>> {
    let snapshot = ready_snapshot(&state)?;
    let layer_id = LayerId::new(id);

    if !snapshot.layer_map.contains_key(&layer_id) {
        return Err(ApiError::NotFound(format!("layer {}", layer_id)));
    }

    let slots: Vec<ClipSlot> = snapshot
        .clip_slots
        .iter()
        .filter(|slot| slot.layer_id == layer_id)
        .cloned()
        .collect();

    Ok(Json(ClipsResponse::from_slots(&snapshot, slots)))
}

fn ready_snapshot(state: &AppState) -> ApiResult<Snapshot> {
    let snapshot = state.scheduler.snapshot();
    if snapshot.has_data() {
        Ok(snapshot)
    } else {
        Err(ApiError::Unavailable(
            "no successful update cycle yet".to_string(),
        ))
    }
}

/// Build snapshot routes
pub fn state_routes() -> Router<AppState> {
    Router::new()
        .route("/composition", get(get_composition))
        .route("/state", get(get_state))
        .route("/clips", get(get_clips))
        .route("/layers/:id", get(get_layer))
        .route("/layers/:id/clips", get(get_layer_clips))
}
