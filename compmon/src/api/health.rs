//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", "starting" before the first successful cycle, or "degraded"
    /// while the latest cycle failed
    pub status: String,
    /// Module name ("compmon")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Source revision stamped at build time
    pub revision: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Error of the latest cycle, if it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let snapshot = state.scheduler.snapshot();
    let status = match (&snapshot.last_error, snapshot.has_data()) {
        (Some(_), _) => "degraded",
        (None, true) => "ok",
        (None, false) => "starting",
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "compmon".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        revision: env!("COMPMON_REVISION").to_string(),
        uptime_seconds,
        last_error: snapshot.last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
