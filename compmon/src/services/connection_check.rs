//! Remote reachability check
//!
//! One composition request, classified for the user. Used before the first
//! cycle and by `compmon --check`; never mutates engine state.

use serde::Deserialize;
use std::time::Duration;

use super::transport::{composition_path, Transport};
use super::update_coordinator::DEFAULT_COMPOSITION_NAME;
use crate::model::CompositionDoc;

/// Reachability outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// The remote answered with a composition document
    Reachable { composition_name: String },
    /// The remote answered, but not with success
    UnexpectedStatus(u16),
    /// No usable answer (connection, timeout or decode failure)
    Unreachable(String),
}

impl ConnectionStatus {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ConnectionStatus::Reachable { .. })
    }
}

/// Check that the remote API answers the composition request
pub async fn check_connection(transport: &dyn Transport, timeout: Duration) -> ConnectionStatus {
    tracing::debug!("Checking remote reachability");

    let response = match transport.get_json(&composition_path(), timeout).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Remote API unreachable");
            return ConnectionStatus::Unreachable(e.to_string());
        }
    };

    if !response.is_success() {
        tracing::warn!(status = response.status, "Remote API returned non-success status");
        return ConnectionStatus::UnexpectedStatus(response.status);
    }

    let doc = response
        .into_body()
        .map_err(|e| e.to_string())
        .and_then(|body| CompositionDoc::deserialize(&body).map_err(|e| e.to_string()));

    match doc {
        Ok(doc) => {
            let composition_name = doc.name.get_or(DEFAULT_COMPOSITION_NAME.to_string());
            tracing::info!(composition = %composition_name, "Remote API reachable");
            ConnectionStatus::Reachable { composition_name }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Remote API returned an unreadable composition");
            ConnectionStatus::Unreachable(e)
        }
    }
}
