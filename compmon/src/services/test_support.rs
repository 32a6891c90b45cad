//! Scripted transport for engine unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::transport::{JsonResponse, Transport, TransportError};

#[derive(Debug, Clone)]
enum Reply {
    Json(u16, Value),
    Status(u16),
    Fail(TransportError),
}

/// Per-path canned replies plus a log of every request made
///
/// One-shot replies are consumed first; otherwise the standing reply for the
/// path is used; unknown paths answer 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    standing: Mutex<HashMap<String, Reply>>,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<(String, String, Duration)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every request to `path` with `status` and `body`
    pub fn respond(&self, path: &str, status: u16, body: Value) {
        self.standing
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Json(status, body));
    }

    /// Answer every request to `path` with a bodiless `status`
    pub fn respond_status(&self, path: &str, status: u16) {
        self.standing
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Status(status));
    }

    /// Fail every request to `path`
    pub fn fail(&self, path: &str, error: TransportError) {
        self.standing
            .lock()
            .unwrap()
            .insert(path.to_string(), Reply::Fail(error));
    }

    /// Fail the next request to `path` only
    pub fn fail_once(&self, path: &str, error: TransportError) {
        self.queued
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(Reply::Fail(error));
    }

    /// `(method, path)` of every request in order
    pub fn requests(&self) -> Vec<(String, String)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(method, path, _)| (method.clone(), path.clone()))
            .collect()
    }

    /// Timeout passed with each request to `path`
    pub fn timeouts_for(&self, path: &str) -> Vec<Duration> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p, _)| p == path)
            .map(|(_, _, timeout)| *timeout)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.timeouts_for(path).len()
    }

    fn next_reply(&self, method: &str, path: &str, timeout: Duration) -> Reply {
        self.log
            .lock()
            .unwrap()
            .push((method.to_string(), path.to_string(), timeout));

        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }

        self.standing
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or(Reply::Status(404))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, path: &str, timeout: Duration) -> Result<JsonResponse, TransportError> {
        match self.next_reply("GET", path, timeout) {
            Reply::Json(status, body) => {
                let success = (200..300).contains(&status);
                Ok(JsonResponse {
                    status,
                    body: success.then_some(body),
                })
            }
            Reply::Status(status) => Ok(JsonResponse { status, body: None }),
            Reply::Fail(error) => Err(error),
        }
    }

    async fn post(&self, path: &str, timeout: Duration) -> Result<u16, TransportError> {
        match self.next_reply("POST", path, timeout) {
            Reply::Json(status, _) | Reply::Status(status) => Ok(status),
            Reply::Fail(error) => Err(error),
        }
    }
}
