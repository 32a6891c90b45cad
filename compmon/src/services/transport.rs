//! HTTP transport to the remote REST API
//!
//! The engine talks to the remote only through the [`Transport`] trait, so the
//! update logic can be exercised against scripted responses. [`HttpTransport`]
//! is the production implementation on top of `reqwest`.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::model::{ClipId, LayerId};

const USER_AGENT: &str = concat!("compmon/", env!("CARGO_PKG_VERSION"));

/// Transport-level failures
///
/// A non-success HTTP status is not a transport failure; it is reported in
/// [`JsonResponse::status`] and classified by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Status code plus decoded body of a GET
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    pub status: u16,
    /// Decoded JSON, present for success statuses only
    pub body: Option<Value>,
}

impl JsonResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a success response, or a decode error when it is missing
    pub fn into_body(self) -> Result<Value, TransportError> {
        self.body.ok_or_else(|| {
            TransportError::Decode(format!("HTTP {} response carried no JSON body", self.status))
        })
    }
}

/// Request/response access to the remote API
///
/// Paths are relative to the API base (host, port and version prefix).
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `path` and decode the body as JSON when the status is a success
    async fn get_json(&self, path: &str, timeout: Duration) -> Result<JsonResponse, TransportError>;

    /// POST to `path` with an empty body, returning the status code
    async fn post(&self, path: &str, timeout: Duration) -> Result<u16, TransportError>;
}

/// Root composition document
pub fn composition_path() -> String {
    "/composition".to_string()
}

/// Layer detail document
pub fn layer_path(layer_id: &LayerId) -> String {
    format!("/composition/layers/by-id/{}", layer_id)
}

/// Single clip document
pub fn clip_path(clip_id: &ClipId) -> String {
    format!("/composition/clips/by-id/{}", clip_id)
}

/// Clip trigger action
pub fn clip_connect_path(clip_id: &ClipId) -> String {
    format!("/composition/clips/by-id/{}/connect", clip_id)
}

/// reqwest-backed [`Transport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (e.g. `http://127.0.0.1:8080/api/v1`)
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_decode() {
        TransportError::Decode(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path: &str, timeout: Duration) -> Result<JsonResponse, TransportError> {
        let url = self.url(path);
        tracing::debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "GET");

        let response = self
            .http_client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Ok(JsonResponse { status, body: None });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| match classify(e, timeout) {
                TransportError::Network(msg) => TransportError::Decode(msg),
                other => other,
            })?;

        Ok(JsonResponse {
            status,
            body: Some(body),
        })
    }

    async fn post(&self, path: &str, timeout: Duration) -> Result<u16, TransportError> {
        let url = self.url(path);
        tracing::debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "POST");

        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        Ok(response.status().as_u16())
    }
}
