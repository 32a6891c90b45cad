//! compmon library interface
//!
//! Polling engine for a remote composition REST API plus the local read API
//! that exposes its last-known-good view. Exposed as a library for
//! integration testing.

pub mod api;
pub mod error;
pub mod model;
pub mod services;
pub mod value;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use compmon_common::events::EventBus;
use services::{ClipTrigger, SchedulerHandle};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Published snapshot and scheduler commands
    pub scheduler: SchedulerHandle,
    /// Clip trigger action against the remote
    pub trigger: Arc<ClipTrigger>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(scheduler: SchedulerHandle, trigger: ClipTrigger, event_bus: EventBus) -> Self {
        Self {
            scheduler,
            trigger: Arc::new(trigger),
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .merge(api::state_routes())
        .merge(api::action_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
