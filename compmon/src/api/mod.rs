//! HTTP read API
//!
//! Projection of the published snapshot plus the two actions (clip trigger
//! and rediscovery) forwarded to the engine.

pub mod actions;
pub mod health;
pub mod sse;
pub mod state;

pub use actions::action_routes;
pub use health::health_routes;
pub use sse::event_stream;
pub use state::state_routes;
