//! Clip trigger action
//!
//! Fire-and-forget `POST .../clips/by-id/{id}/connect`. Outcomes are reported
//! to the caller only; the update state is never touched.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::transport::{clip_connect_path, Transport, TransportError};
use crate::model::ClipId;

/// Statuses the remote answers a successful trigger with
const SUCCESS_STATUSES: [u16; 2] = [200, 204];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("Trigger rejected with HTTP {0}")]
    Rejected(u16),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct ClipTrigger {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl ClipTrigger {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Trigger (connect) a clip
    pub async fn trigger(&self, clip_id: &ClipId) -> Result<(), TriggerError> {
        let status = match self
            .transport
            .post(&clip_connect_path(clip_id), self.timeout)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(clip_id = %clip_id, error = %e, "Clip trigger failed");
                return Err(e.into());
            }
        };

        if SUCCESS_STATUSES.contains(&status) {
            tracing::info!(clip_id = %clip_id, "Clip triggered");
            Ok(())
        } else {
            tracing::warn!(clip_id = %clip_id, status, "Clip trigger rejected");
            Err(TriggerError::Rejected(status))
        }
    }
}
