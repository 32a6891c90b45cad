//! Polling engine
//!
//! Transport, composition discovery, layer polling and the periodic
//! scheduler that publishes results.

pub mod clip_cache;
pub mod clip_trigger;
pub mod connection_check;
pub mod layer_poller;
pub mod scheduler;
pub mod transport;
pub mod tree_walker;
pub mod update_coordinator;

#[cfg(test)]
pub(crate) mod test_support;

pub use clip_cache::ClipNameCache;
pub use clip_trigger::{ClipTrigger, TriggerError};
pub use connection_check::{check_connection, ConnectionStatus};
pub use layer_poller::{poll_layer, LayerPoll, PollTimeouts};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerHandle, Snapshot};
pub use transport::{HttpTransport, JsonResponse, Transport, TransportError};
pub use tree_walker::{flatten_composition, walk_composition};
pub use update_coordinator::{
    host_composition_name, CycleError, CycleFailure, CyclePhase, DiscoveryOutcome, EngineTimeouts,
    UpdateCoordinator,
};
