//! Periodic update host
//!
//! Runs the [`UpdateCoordinator`] on a fixed interval inside one task, so
//! cycles never overlap. The last-known-good state is published on a
//! `watch` channel and every outcome is broadcast on the [`EventBus`].
//!
//! Layers skipped in a cycle keep the state they had in the previous
//! snapshot; a failed cycle leaves the published data untouched and only
//! records the error.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use compmon_common::events::{CompmonEvent, EventBus};

use super::update_coordinator::{DiscoveryOutcome, UpdateCoordinator, DEFAULT_COMPOSITION_NAME};
use crate::model::{AggregatedUpdate, ClipSlot, LayerId, LayerMap, LayerState};

/// State published to consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub composition_name: String,
    /// Every known layer, in discovery order
    pub layer_map: LayerMap,
    /// Latest known state per layer, in layer map order
    pub layers: IndexMap<LayerId, LayerState>,
    pub clip_slots: Vec<ClipSlot>,
    /// Completion time of the last successful cycle
    pub updated_at: Option<DateTime<Utc>>,
    /// Error of the most recent cycle, cleared by the next success
    pub last_error: Option<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            composition_name: DEFAULT_COMPOSITION_NAME.to_string(),
            layer_map: LayerMap::new(),
            layers: IndexMap::new(),
            clip_slots: Vec::new(),
            updated_at: None,
            last_error: None,
        }
    }
}

impl Snapshot {
    /// Whether any cycle has succeeded yet
    pub fn has_data(&self) -> bool {
        self.updated_at.is_some()
    }

    /// Successor snapshot after a successful cycle
    ///
    /// States in `update` replace previous ones; layers missing from it keep
    /// their previous state. The clip slot list is replaced wholesale.
    pub fn merged(&self, update: AggregatedUpdate, layer_map: &LayerMap, now: DateTime<Utc>) -> Self {
        let mut fresh = update.layers;
        let mut layers = IndexMap::with_capacity(layer_map.len());

        for layer_id in layer_map.keys() {
            let state = fresh
                .shift_remove(layer_id)
                .or_else(|| self.layers.get(layer_id).cloned());
            if let Some(state) = state {
                layers.insert(layer_id.clone(), state);
            }
        }

        Self {
            composition_name: update.composition_name,
            layer_map: layer_map.clone(),
            layers,
            clip_slots: update.clip_slots,
            updated_at: Some(now),
            last_error: None,
        }
    }
}

/// Scheduling cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
    /// Periodic rediscovery; `None` disables it
    pub rediscover_interval: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerCommand {
    Rediscover,
}

/// Consumer side of a running [`Scheduler`]
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    snapshot: watch::Receiver<Snapshot>,
    commands: mpsc::Sender<SchedulerCommand>,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Current published snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified on every published change
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Ask the scheduler to rerun discovery before its next cycle
    ///
    /// Returns `false` if the scheduler is gone or a request is already
    /// pending.
    pub fn request_rediscovery(&self) -> bool {
        self.commands.try_send(SchedulerCommand::Rediscover).is_ok()
    }

    /// Ask for an update cycle now instead of at the next tick
    ///
    /// Requests made while one is pending collapse into a single cycle.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stop the scheduler after its current cycle
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

pub struct Scheduler {
    coordinator: UpdateCoordinator,
    config: SchedulerConfig,
    event_bus: EventBus,
    snapshot: watch::Sender<Snapshot>,
    commands: mpsc::Receiver<SchedulerCommand>,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        coordinator: UpdateCoordinator,
        config: SchedulerConfig,
        event_bus: EventBus,
        cancel: CancellationToken,
    ) -> (Self, SchedulerHandle) {
        let initial = Snapshot {
            composition_name: coordinator.composition_name().to_string(),
            ..Snapshot::default()
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::channel(1);
        let refresh = Arc::new(Notify::new());

        let scheduler = Self {
            coordinator,
            config,
            event_bus,
            snapshot: snapshot_tx,
            commands: command_rx,
            refresh: refresh.clone(),
            cancel: cancel.clone(),
        };
        let handle = SchedulerHandle {
            snapshot: snapshot_rx,
            commands: command_tx,
            refresh,
            cancel,
        };
        (scheduler, handle)
    }

    /// Run until cancelled
    pub async fn run(mut self) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            rediscover = ?self.config.rediscover_interval,
            "Scheduler started"
        );

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut rediscover = self.config.rediscover_interval.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(command) = self.commands.recv() => match command {
                    SchedulerCommand::Rediscover => {
                        self.run_discovery().await;
                    }
                },
                _ = self.refresh.notified() => {
                    self.run_cycle().await;
                    ticker.reset();
                }
                _ = next_tick(&mut rediscover) => {
                    self.run_discovery().await;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Run one update cycle and publish its outcome
    ///
    /// Returns whether the cycle succeeded.
    pub async fn run_cycle(&mut self) -> bool {
        let result = self.coordinator.update().await;

        if let Some(outcome) = self.coordinator.take_discovery() {
            self.announce_discovery(outcome);
        }

        match result {
            Ok(update) => {
                let polled_layers = update.layers.len();
                let skipped_layers = update.skipped_layers.len();
                let clip_slots = update.clip_slots.len();

                let layer_map = self.coordinator.layers();
                self.snapshot
                    .send_modify(|snapshot| *snapshot = snapshot.merged(update, layer_map, Utc::now()));

                self.event_bus.emit_lossy(CompmonEvent::CycleCompleted {
                    polled_layers,
                    skipped_layers,
                    clip_slots,
                    timestamp: Utc::now(),
                });
                true
            }
            Err(e) => {
                tracing::warn!(phase = %e.phase, error = %e, "Update cycle failed");
                let message = e.to_string();
                self.snapshot
                    .send_modify(|snapshot| snapshot.last_error = Some(message.clone()));

                self.event_bus.emit_lossy(CompmonEvent::CycleFailed {
                    phase: e.phase.to_string(),
                    message,
                    timestamp: Utc::now(),
                });
                false
            }
        }
    }

    /// Rerun discovery outside the regular cycle
    pub async fn run_discovery(&mut self) {
        match self.coordinator.discover().await {
            Ok(_) => {
                if let Some(outcome) = self.coordinator.take_discovery() {
                    self.announce_discovery(outcome);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rediscovery failed, keeping known layers");
                self.event_bus.emit_lossy(CompmonEvent::CycleFailed {
                    phase: e.phase.to_string(),
                    message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    fn announce_discovery(&self, outcome: DiscoveryOutcome) {
        let layer_map = self.coordinator.layers();
        self.snapshot.send_modify(|snapshot| {
            snapshot.composition_name = outcome.composition_name.clone();
            snapshot.layer_map = layer_map.clone();
        });

        self.event_bus.emit_lossy(CompmonEvent::LayersDiscovered {
            composition_name: outcome.composition_name,
            layer_count: outcome.layer_count,
            new_layers: outcome.new_layers,
            timestamp: Utc::now(),
        });
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending::<()>().await,
    }
}
