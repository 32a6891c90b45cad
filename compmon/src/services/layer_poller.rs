//! Layer/clip poller
//!
//! Fetches one layer's detail document and derives its [`LayerState`] and
//! [`ClipSlot`] list. Clip names missing from the layer document are looked up
//! in the [`ClipNameCache`] and, failing that, through one short single-clip
//! request whose failures are always swallowed.

use serde::Deserialize;
use std::time::Duration;

use super::clip_cache::ClipNameCache;
use super::transport::{clip_path, layer_path, Transport, TransportError};
use crate::model::{
    ClipDoc, ClipId, ClipSlot, LayerDoc, LayerId, LayerState, EMPTY_CLIP_NAME, UNNAMED_CLIP_NAME,
};

/// Request bounds used while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeouts {
    pub layer: Duration,
    /// Single-clip name fallback; kept short so it cannot stall a cycle
    pub clip: Duration,
}

/// Outcome of polling one layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerPoll {
    Polled {
        state: LayerState,
        slots: Vec<ClipSlot>,
    },
    /// The layer request returned a non-success status; nothing was derived
    Skipped { status: u16 },
}

/// Poll one layer
///
/// A non-success status yields [`LayerPoll::Skipped`]. A transport failure on
/// the layer request (or an undecodable layer body) is returned as an error
/// for the caller to treat as fatal to the cycle.
pub async fn poll_layer(
    transport: &dyn Transport,
    cache: &mut ClipNameCache,
    timeouts: PollTimeouts,
    layer_id: &LayerId,
    layer_name: &str,
) -> Result<LayerPoll, TransportError> {
    let response = transport
        .get_json(&layer_path(layer_id), timeouts.layer)
        .await?;

    if !response.is_success() {
        tracing::warn!(
            layer_id = %layer_id,
            layer_name = %layer_name,
            status = response.status,
            "Layer request failed, keeping previous state"
        );
        return Ok(LayerPoll::Skipped {
            status: response.status,
        });
    }

    let body = response.into_body()?;
    let doc = LayerDoc::deserialize(&body)
        .map_err(|e| TransportError::Decode(format!("layer {}: {}", layer_id, e)))?;

    let state = derive_layer_state(&doc);

    let mut slots = Vec::new();
    for (index, slot) in doc.clips.iter().enumerate() {
        let Some(clip) = slot else {
            continue;
        };
        let column_index = index + 1;
        let clip_id = clip.id.get().cloned();
        let clip_name =
            resolve_clip_name(transport, cache, timeouts.clip, clip, clip_id.as_ref(), column_index)
                .await;

        slots.push(ClipSlot {
            layer_id: layer_id.clone(),
            layer_name: layer_name.to_string(),
            column_index,
            clip_id,
            clip_name,
        });
    }

    tracing::trace!(
        layer_id = %layer_id,
        active_clip = %state.active_clip_name,
        slots = slots.len(),
        "Layer polled"
    );

    Ok(LayerPoll::Polled { state, slots })
}

/// Derive bypass/solo flags and the active clip from a layer document
pub fn derive_layer_state(doc: &LayerDoc) -> LayerState {
    let (active_clip_id, active_clip_name) = match &doc.active_clip {
        None => (None, EMPTY_CLIP_NAME.to_string()),
        Some(clip) => (
            clip.id.get().cloned(),
            clip.display_name().unwrap_or(UNNAMED_CLIP_NAME).to_string(),
        ),
    };

    LayerState {
        active_clip_id,
        active_clip_name,
        is_bypassed: doc.bypassed.get_or(false),
        is_solo: doc.solo.get_or(false),
    }
}

async fn resolve_clip_name(
    transport: &dyn Transport,
    cache: &mut ClipNameCache,
    timeout: Duration,
    clip: &ClipDoc,
    clip_id: Option<&ClipId>,
    column_index: usize,
) -> String {
    if let Some(name) = clip.display_name() {
        return name.to_string();
    }

    if let Some(clip_id) = clip_id {
        if let Some(name) = cache.resolve(clip_id) {
            return name.to_string();
        }

        if let Some(name) = fetch_clip_name(transport, clip_id, timeout).await {
            cache.record(clip_id.clone(), name.clone());
            return name;
        }
    }

    format!("Clip {}", column_index)
}

/// Single-clip lookup; every failure maps to `None`
async fn fetch_clip_name(
    transport: &dyn Transport,
    clip_id: &ClipId,
    timeout: Duration,
) -> Option<String> {
    let response = match transport.get_json(&clip_path(clip_id), timeout).await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(clip_id = %clip_id, error = %e, "Clip name lookup failed");
            return None;
        }
    };

    if !response.is_success() {
        tracing::debug!(
            clip_id = %clip_id,
            status = response.status,
            "Clip name lookup returned non-success status"
        );
        return None;
    }

    let name = response
        .body
        .as_ref()
        .and_then(ClipDoc::from_value)
        .and_then(|clip| clip.display_name().map(str::to_owned));

    if name.is_none() {
        tracing::debug!(clip_id = %clip_id, "Clip document carried no name");
    }
    name
}
