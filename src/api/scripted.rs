//! In-memory [`RemoteApi`] answering from canned responses
//!
//! Routes are keyed by [`request_key`]. Each route holds a queue of
//! responses; the last one repeats once the queue is drained. Unknown routes
//! answer 404 like the real API.

use super::{classify_status, request_key, ApiError, ApiResult, RateLimit, RemoteApi};
use crate::CancelToken;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// HTTP 200 with this body
    Body(Vec<u8>),
    /// Any other status, optionally with rate-limit headers
    Status(u16, Option<RateLimit>),
    /// Connection-level failure
    Network(String),
}

impl ScriptedResponse {
    pub fn json(value: serde_json::Value) -> Self {
        ScriptedResponse::Body(value.to_string().into_bytes())
    }

    pub fn status(code: u16) -> Self {
        ScriptedResponse::Status(code, None)
    }

    fn to_result(&self) -> ApiResult<Vec<u8>> {
        match self {
            ScriptedResponse::Body(body) => Ok(body.clone()),
            ScriptedResponse::Status(code, rate_limit) => {
                Err(classify_status(*code, rate_limit.clone()))
            }
            ScriptedResponse::Network(message) => Err(ApiError::Network(message.clone())),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedApi {
    routes: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `key` (`path?k=v&...`)
    pub fn on(self, key: &str, response: ScriptedResponse) -> Self {
        self.push(key, response);
        self
    }

    pub fn push(&self, key: &str, response: ScriptedResponse) {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes
            .entry(key.trim_start_matches('/').to_string())
            .or_default()
            .push_back(response);
    }

    /// Every request seen so far, as request keys
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// How many times `key` was requested
    pub fn calls_to(&self, key: &str) -> usize {
        let key = key.trim_start_matches('/');
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|k| k.as_str() == key)
            .count()
    }
}

impl RemoteApi for ScriptedApi {
    fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancelToken,
    ) -> ApiResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let key = request_key(path, query);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.clone());

        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let Some(queue) = routes.get_mut(&key) else {
            return Err(classify_status(404, None));
        };
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match response {
            Some(response) => response.to_result(),
            None => Err(classify_status(404, None)),
        }
    }
}
