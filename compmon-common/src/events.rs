//! Event types and EventBus for compmon
//!
//! Cycle outcomes are broadcast so observers (SSE clients, logs, tests) can
//! follow the engine without polling the read API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// compmon event types
///
/// Events are broadcast via [`EventBus`] and serialize with a `type` tag for
/// SSE transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompmonEvent {
    /// Tree discovery finished
    LayersDiscovered {
        /// Composition display name read from the tree root
        composition_name: String,
        /// Total layers now known
        layer_count: usize,
        /// Layers added by this discovery run
        new_layers: usize,
        timestamp: DateTime<Utc>,
    },

    /// Update cycle finished and produced a new aggregate
    CycleCompleted {
        /// Layers whose state was refreshed
        polled_layers: usize,
        /// Layers skipped after a non-success status
        skipped_layers: usize,
        /// Clip slots in the rebuilt sequence
        clip_slots: usize,
        timestamp: DateTime<Utc>,
    },

    /// Update cycle aborted; the previous aggregate stays current
    CycleFailed {
        /// Phase the cycle was in ("discovering" or "polling")
        phase: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A clip trigger request completed
    ClipTriggered {
        clip_id: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

impl CompmonEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            CompmonEvent::LayersDiscovered { .. } => "LayersDiscovered",
            CompmonEvent::CycleCompleted { .. } => "CycleCompleted",
            CompmonEvent::CycleFailed { .. } => "CycleFailed",
            CompmonEvent::ClipTriggered { .. } => "ClipTriggered",
        }
    }
}

/// Broadcast bus for [`CompmonEvent`]s
///
/// Cloning shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CompmonEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// ```
    /// use compmon_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CompmonEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CompmonEvent,
    ) -> Result<usize, broadcast::error::SendError<CompmonEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CompmonEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
