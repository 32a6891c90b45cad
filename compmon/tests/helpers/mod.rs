//! Test helper utilities
//!
//! An in-process stand-in for the remote composition API, bound to an
//! ephemeral port.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Prefix every stub route is served under
pub const API_PREFIX: &str = "/api/v1";

/// Canned answer for one route
#[derive(Debug, Clone)]
pub enum StubReply {
    Json(u16, Value),
    /// Status only, empty body
    Status(u16),
    /// Raw body sent with a JSON content type
    Text(u16, String),
    /// JSON answer sent after a delay
    Delayed(Duration, Value),
}

/// Stub remote API
///
/// Unscripted routes answer 404. Every request is logged.
#[derive(Debug, Clone, Default)]
pub struct StubRemote {
    routes: Arc<Mutex<HashMap<(String, String), StubReply>>>,
    hits: Arc<Mutex<Vec<(String, String)>>>,
}

impl StubRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str, reply: StubReply) {
        self.script("GET", path, reply);
    }

    pub fn post(&self, path: &str, reply: StubReply) {
        self.script("POST", path, reply);
    }

    fn script(&self, method: &str, path: &str, reply: StubReply) {
        self.routes
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), reply);
    }

    /// `(method, path)` of every request received, prefix stripped
    pub fn hits(&self) -> Vec<(String, String)> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hit_count(&self, method: &str, path: &str) -> usize {
        self.hits()
            .iter()
            .filter(|(m, p)| m == method && p == path)
            .count()
    }

    /// Serve on an ephemeral port; returns the API base URL
    pub async fn start(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new().fallback(handle).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}{}", addr, API_PREFIX)
    }
}

async fn handle(State(stub): State<StubRemote>, method: Method, uri: Uri) -> Response {
    let path = uri
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(uri.path())
        .to_string();
    let key = (method.as_str().to_string(), path);

    stub.hits.lock().unwrap().push(key.clone());
    let reply = stub.routes.lock().unwrap().get(&key).cloned();

    match reply {
        None => StatusCode::NOT_FOUND.into_response(),
        Some(StubReply::Json(status, body)) => (status_code(status), Json(body)).into_response(),
        Some(StubReply::Status(status)) => status_code(status).into_response(),
        Some(StubReply::Text(status, body)) => (
            status_code(status),
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        Some(StubReply::Delayed(delay, body)) => {
            tokio::time::sleep(delay).await;
            Json(body).into_response()
        }
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap()
}

/// Base URL with nothing listening behind it
pub async fn closed_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}{}", addr, API_PREFIX)
}
