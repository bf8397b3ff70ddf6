//! GitHub REST client
//!
//! Uses ureq (sync HTTP). One agent, and therefore one bounded connection
//! pool, is shared by every worker thread.

use super::{classify_status, ApiError, ApiResult, RateLimit, RemoteApi};
use crate::CancelToken;
use chrono::DateTime;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.github.com/";

/// Upper bound on a single response body (commit detail includes patches)
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// How often a worker waiting for a connection slot rechecks cancellation
const GATE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// Sent as `Authorization: Bearer <token>`
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
    /// Requests in flight at once, and idle connections kept for reuse
    pub max_connections: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            user_agent: format!("commit-tally/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            max_connections: 16,
        }
    }
}

/// Authenticated client for the GitHub REST API
pub struct GithubClient {
    config: ApiConfig,
    base_url: String,
    agent: ureq::Agent,
    gate: ConnectionGate,
}

/// Fixed set of connection slots handed out through a bounded channel
struct ConnectionGate {
    release: Sender<()>,
    acquire: Receiver<()>,
}

/// Returns its slot to the gate on drop
struct Slot<'a> {
    gate: &'a ConnectionGate,
}

impl ConnectionGate {
    fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        let (release, acquire) = bounded(slots);
        for _ in 0..slots {
            let _ = release.send(());
        }
        Self { release, acquire }
    }

    /// Block until a slot is free or `cancel` fires
    fn enter(&self, cancel: &CancelToken) -> ApiResult<Slot<'_>> {
        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            match self.acquire.recv_timeout(GATE_POLL) {
                Ok(()) => return Ok(Slot { gate: self }),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ApiError::Network("connection gate closed".to_string()))
                }
            }
        }
    }
}

impl Drop for Slot<'_> {
    fn drop(&mut self) {
        let _ = self.gate.release.send(());
    }
}

fn make_agent(config: &ApiConfig) -> ureq::Agent {
    ureq::config::Config::builder()
        .http_status_as_error(false) // Status codes are classified by us
        .max_redirects(0) // Anything but 200 is an error, 3xx included
        .timeout_global(Some(config.timeout))
        .max_idle_connections(config.max_connections)
        .max_idle_connections_per_host(config.max_connections)
        .build()
        .new_agent()
}

impl GithubClient {
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let base = config.base_url.trim();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ApiError::Network(format!(
                "invalid base URL '{}': expected http:// or https://",
                config.base_url
            )));
        }
        let base_url = format!("{}/", base.trim_end_matches('/'));
        Ok(Self {
            agent: make_agent(&config),
            gate: ConnectionGate::new(config.max_connections),
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve a relative API path against the base URL
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl RemoteApi for GithubClient {
    fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancelToken,
    ) -> ApiResult<Vec<u8>> {
        // Held until the body has been read
        let _slot = self.gate.enter(cancel)?;

        let url = self.url_for(path);
        let mut req = self
            .agent
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", &self.config.user_agent);

        for (key, value) in query {
            req = req.query(*key, value);
        }

        if let Some(token) = &self.config.token {
            req = req.header("Authorization", &format!("Bearer {}", token));
        }

        // Never outlive the global deadline
        if let Some(remaining) = cancel.remaining() {
            if remaining.is_zero() {
                return Err(ApiError::Cancelled);
            }
            req = req
                .config()
                .timeout_global(Some(remaining.min(self.config.timeout)))
                .build();
        }

        debug!("GET {} {:?}", url, query);
        let response = req.call().map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let rate_limit = rate_limit_from_headers(response.headers());
            debug!("GET {} -> {}", url, status);
            return Err(classify_status(status, rate_limit));
        }

        response
            .into_body()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| ApiError::Network(format!("failed to read response body: {}", e)))
    }
}

/// Extract GitHub rate-limit headers; `None` when none are present
pub(crate) fn rate_limit_from_headers(headers: &ureq::http::HeaderMap) -> Option<RateLimit> {
    let number = |name: &str| -> Option<u64> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    };

    let remaining = number("x-ratelimit-remaining");
    let reset_at = number("x-ratelimit-reset")
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));
    let retry_after_secs = number("retry-after");

    if remaining.is_none() && reset_at.is_none() && retry_after_secs.is_none() {
        return None;
    }
    Some(RateLimit {
        remaining,
        reset_at,
        retry_after_secs,
    })
}
