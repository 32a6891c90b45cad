//! Update cycle coordinator
//!
//! Owns the [`LayerMap`] and [`ClipNameCache`] and drives one refresh per
//! call to [`UpdateCoordinator::update`]:
//!
//! 1. **Uninitialized → Discovering** when no layers are known yet
//! 2. **Discovering → Polling** once discovery produced layers; a discovery
//!    that yields no layers returns an empty aggregate instead
//! 3. **Polling**: every known layer is polled sequentially in layer map order
//!
//! Any fatal failure ends the cycle with a [`CycleError`] and discards what the
//! cycle had gathered so far. A layer answering with a non-success status is
//! not fatal; it is left out of that cycle's aggregate.
//!
//! Discovery can also be invoked directly through
//! [`UpdateCoordinator::discover`]. It only ever adds layers, so repeated runs
//! never rename or drop a known layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use compmon_common::config::TimeoutConfig;

use super::clip_cache::ClipNameCache;
use super::layer_poller::{poll_layer, LayerPoll, PollTimeouts};
use super::transport::{composition_path, Transport, TransportError};
use super::tree_walker::walk_composition;
use crate::model::{AggregatedUpdate, CompositionDoc, LayerMap};

/// Composition name used until the remote reports one
pub const DEFAULT_COMPOSITION_NAME: &str = "Composition";

/// Fallback composition name that identifies the remote host
pub fn host_composition_name(host: &str) -> String {
    format!("{} ({})", DEFAULT_COMPOSITION_NAME, host.trim())
}

/// Phase of the update state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CyclePhase {
    Uninitialized,
    Discovering,
    Polling,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Uninitialized => "uninitialized",
            CyclePhase::Discovering => "discovering",
            CyclePhase::Polling => "polling",
        };
        f.write_str(name)
    }
}

/// Cause of a fatal cycle failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CycleFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("composition request returned HTTP {0}")]
    CompositionStatus(u16),
}

/// A cycle that ended without producing an aggregate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("update cycle failed while {phase}: {failure}")]
pub struct CycleError {
    pub phase: CyclePhase,
    #[source]
    pub failure: CycleFailure,
}

impl CycleError {
    fn discovering(failure: impl Into<CycleFailure>) -> Self {
        Self {
            phase: CyclePhase::Discovering,
            failure: failure.into(),
        }
    }

    fn polling(failure: impl Into<CycleFailure>) -> Self {
        Self {
            phase: CyclePhase::Polling,
            failure: failure.into(),
        }
    }
}

/// Result of one discovery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    pub composition_name: String,
    /// Layers known after the run
    pub layer_count: usize,
    /// Layers added by the run
    pub new_layers: usize,
}

/// Request bounds for each kind of remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    pub composition: Duration,
    pub layer: Duration,
    pub clip: Duration,
}

impl From<&TimeoutConfig> for EngineTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            composition: config.composition(),
            layer: config.layer(),
            clip: config.clip(),
        }
    }
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// Discovery-and-update engine
///
/// Not meant to be shared: one owner runs one cycle at a time.
pub struct UpdateCoordinator {
    transport: Arc<dyn Transport>,
    timeouts: EngineTimeouts,
    layers: LayerMap,
    clip_names: ClipNameCache,
    composition_name: String,
    /// Used whenever the composition document carries no name
    fallback_name: String,
    last_discovery: Option<DiscoveryOutcome>,
}

impl UpdateCoordinator {
    pub fn new(transport: Arc<dyn Transport>, timeouts: EngineTimeouts) -> Self {
        Self {
            transport,
            timeouts,
            layers: LayerMap::new(),
            clip_names: ClipNameCache::new(),
            composition_name: DEFAULT_COMPOSITION_NAME.to_string(),
            fallback_name: DEFAULT_COMPOSITION_NAME.to_string(),
            last_discovery: None,
        }
    }

    /// Replace the name used while the remote reports none
    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = name.into();
        self.composition_name = self.fallback_name.clone();
        self
    }

    /// Known layers, in discovery order
    pub fn layers(&self) -> &LayerMap {
        &self.layers
    }

    /// Composition name from the most recent successful discovery
    pub fn composition_name(&self) -> &str {
        &self.composition_name
    }

    pub fn clip_names(&self) -> &ClipNameCache {
        &self.clip_names
    }

    /// Phase the next cycle starts in
    pub fn phase(&self) -> CyclePhase {
        if self.layers.is_empty() {
            CyclePhase::Uninitialized
        } else {
            CyclePhase::Polling
        }
    }

    /// Outcome of the last discovery run not yet taken
    pub fn take_discovery(&mut self) -> Option<DiscoveryOutcome> {
        self.last_discovery.take()
    }

    /// Fetch the composition tree and merge its layers into the layer map
    ///
    /// Fails without touching the layer map when the composition cannot be
    /// fetched or decoded.
    pub async fn discover(&mut self) -> Result<DiscoveryOutcome, CycleError> {
        tracing::debug!("Discovering composition layers");

        let response = self
            .transport
            .get_json(&composition_path(), self.timeouts.composition)
            .await
            .map_err(CycleError::discovering)?;

        if !response.is_success() {
            return Err(CycleError::discovering(CycleFailure::CompositionStatus(
                response.status,
            )));
        }

        let body = response.into_body().map_err(CycleError::discovering)?;
        let doc = CompositionDoc::deserialize(&body).map_err(|e| {
            CycleError::discovering(TransportError::Decode(format!("composition: {}", e)))
        })?;

        let new_layers = walk_composition(&doc, &mut self.layers);
        self.composition_name = doc.name.get_or(self.fallback_name.clone());

        let outcome = DiscoveryOutcome {
            composition_name: self.composition_name.clone(),
            layer_count: self.layers.len(),
            new_layers,
        };

        tracing::info!(
            composition = %outcome.composition_name,
            layers = outcome.layer_count,
            new_layers = outcome.new_layers,
            "Composition discovered"
        );

        self.last_discovery = Some(outcome.clone());
        Ok(outcome)
    }

    /// Run one update cycle
    pub async fn update(&mut self) -> Result<AggregatedUpdate, CycleError> {
        if self.layers.is_empty() {
            self.discover().await?;

            if self.layers.is_empty() {
                tracing::warn!(
                    composition = %self.composition_name,
                    "Discovery found no layers, will retry next cycle"
                );
                return Ok(AggregatedUpdate::empty(self.composition_name.clone()));
            }
        }

        let poll_timeouts = PollTimeouts {
            layer: self.timeouts.layer,
            clip: self.timeouts.clip,
        };

        let mut aggregate = AggregatedUpdate::empty(self.composition_name.clone());

        for (layer_id, layer_name) in &self.layers {
            let result = poll_layer(
                self.transport.as_ref(),
                &mut self.clip_names,
                poll_timeouts,
                layer_id,
                layer_name,
            )
            .await
            .map_err(CycleError::polling)?;

            match result {
                LayerPoll::Polled { state, slots } => {
                    aggregate.layers.insert(layer_id.clone(), state);
                    aggregate.clip_slots.extend(slots);
                }
                LayerPoll::Skipped { .. } => {
                    aggregate.skipped_layers.push(layer_id.clone());
                }
            }
        }

        tracing::debug!(
            polled = aggregate.layers.len(),
            skipped = aggregate.skipped_layers.len(),
            clip_slots = aggregate.clip_slots.len(),
            "Update cycle complete"
        );

        Ok(aggregate)
    }
}
