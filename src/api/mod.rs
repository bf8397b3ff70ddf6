//! GitHub REST API access
//!
//! The [`RemoteApi`] trait is the only seam between the fetchers and the
//! network. [`GithubClient`] implements it over a shared `ureq` agent;
//! [`ScriptedApi`] answers from canned responses and backs the test suites.
//!
//! # Environment Variables
//!
//! - `GITHUB_TOKEN`: passed through as a bearer token (read by the CLI)

mod client;
mod retry;
mod scripted;

pub use client::{ApiConfig, GithubClient, DEFAULT_BASE_URL};
pub use retry::{with_retry, RetryPolicy};
pub use scripted::{ScriptedApi, ScriptedResponse};

use crate::CancelToken;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by a [`RemoteApi`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {code} (expected 200)")]
    Status {
        code: u16,
        rate_limit: Option<RateLimit>,
    },

    #[error("rate limit exceeded (HTTP {code}){}", .rate_limit.describe_reset())]
    RateLimited { code: u16, rate_limit: RateLimit },

    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    #[error("request cancelled")]
    Cancelled,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } | ApiError::RateLimited { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Network failures, 429, 5xx and rate limiting are worth another attempt.
    /// Other 4xx, decode errors and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::RateLimited { .. } => true,
            ApiError::Status { code, .. } => *code == 429 || (500..600).contains(code),
            ApiError::Decode { .. } | ApiError::Cancelled => false,
        }
    }
}

/// Rate-limit metadata extracted from response headers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RateLimit {
    /// `x-ratelimit-remaining`
    pub remaining: Option<u64>,
    /// `x-ratelimit-reset` (epoch seconds)
    pub reset_at: Option<DateTime<Utc>>,
    /// `retry-after` in seconds
    pub retry_after_secs: Option<u64>,
}

impl RateLimit {
    /// Whether the server says the quota is used up
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0) || self.retry_after_secs.is_some()
    }

    /// How long to wait before the next attempt, measured from `now`
    pub fn wait_hint(&self, now: DateTime<Utc>) -> Option<Duration> {
        if let Some(secs) = self.retry_after_secs {
            return Some(Duration::from_secs(secs));
        }
        self.reset_at
            .map(|reset| (reset - now).to_std().unwrap_or(Duration::ZERO))
    }

    fn describe_reset(&self) -> String {
        match (self.retry_after_secs, self.reset_at) {
            (Some(secs), _) => format!(", retry after {}s", secs),
            (None, Some(reset)) => format!(", resets at {}", reset.to_rfc3339()),
            (None, None) => String::new(),
        }
    }
}

/// Map a non-200 status to the matching error variant
///
/// A 429 carrying a reset time or `retry-after` is always rate limiting. A
/// 403 is only rate limiting when the quota is spent or unknown; with quota
/// left it is a permission error.
pub(crate) fn classify_status(code: u16, rate_limit: Option<RateLimit>) -> ApiError {
    match rate_limit {
        Some(rl) if is_rate_limited(code, &rl) => ApiError::RateLimited {
            code,
            rate_limit: rl,
        },
        rate_limit => ApiError::Status { code, rate_limit },
    }
}

fn is_rate_limited(code: u16, rl: &RateLimit) -> bool {
    let has_reset = rl.reset_at.is_some() || rl.retry_after_secs.is_some();
    match code {
        429 => has_reset || rl.is_exhausted(),
        403 => rl.is_exhausted() || (rl.remaining.is_none() && has_reset),
        _ => false,
    }
}

/// Blocking GET against the remote API
///
/// Implementations resolve `path` against their base URL and return the raw
/// body only for HTTP 200. They must not keep per-request state, since a
/// single instance is shared by every worker.
pub trait RemoteApi: Send + Sync {
    fn get(&self, path: &str, query: &[(&str, String)], cancel: &CancelToken)
        -> ApiResult<Vec<u8>>;
}

/// Decode a JSON body into a typed response shape
pub fn decode_json<T: DeserializeOwned>(body: &[u8], what: &str) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode {
        what: what.to_string(),
        message: e.to_string(),
    })
}

/// `path?k=v&k=v`, in the order given
pub fn request_key(path: &str, query: &[(&str, String)]) -> String {
    let path = path.trim_start_matches('/');
    if query.is_empty() {
        return path.to_string();
    }
    let params: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", path, params.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(classify_status(429, None).is_retryable());
        assert!(classify_status(502, None).is_retryable());
        assert!(!classify_status(404, None).is_retryable());
        assert!(!classify_status(403, None).is_retryable());
        assert!(!classify_status(202, None).is_retryable());
        assert!(!ApiError::Cancelled.is_retryable());
        assert!(!decode_json::<Vec<u64>>(b"{", "page").unwrap_err().is_retryable());
    }

    #[test]
    fn test_exhausted_quota_is_rate_limited() {
        let rl = RateLimit {
            remaining: Some(0),
            reset_at: DateTime::from_timestamp(1_700_000_000, 0),
            retry_after_secs: None,
        };
        let err = classify_status(403, Some(rl.clone()));
        assert!(matches!(err, ApiError::RateLimited { code: 403, .. }));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("resets at"));

        // Forbidden with quota left is a plain permission error
        let rl = RateLimit {
            remaining: Some(42),
            ..Default::default()
        };
        let err = classify_status(403, Some(rl));
        assert!(matches!(err, ApiError::Status { code: 403, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_too_many_requests_with_reset_is_rate_limited() {
        let rl = RateLimit {
            reset_at: DateTime::from_timestamp(1_700_000_000, 0),
            ..Default::default()
        };
        let err = classify_status(429, Some(rl.clone()));
        assert!(matches!(err, ApiError::RateLimited { code: 429, .. }));

        // Secondary limits on 403 come without a remaining count
        let err = classify_status(403, Some(rl));
        assert!(matches!(err, ApiError::RateLimited { code: 403, .. }));

        // Reset header alone with quota left stays a permission error
        let rl = RateLimit {
            remaining: Some(10),
            reset_at: DateTime::from_timestamp(1_700_000_000, 0),
            ..Default::default()
        };
        assert!(matches!(
            classify_status(403, Some(rl)),
            ApiError::Status { code: 403, .. }
        ));
        assert!(matches!(classify_status(429, None), ApiError::Status { code: 429, .. }));
    }

    #[test]
    fn test_wait_hint() {
        let now = DateTime::from_timestamp(1_000, 0).unwrap();
        let rl = RateLimit {
            reset_at: DateTime::from_timestamp(1_060, 0),
            ..Default::default()
        };
        assert_eq!(rl.wait_hint(now), Some(Duration::from_secs(60)));

        let past = RateLimit {
            reset_at: DateTime::from_timestamp(10, 0),
            ..Default::default()
        };
        assert_eq!(past.wait_hint(now), Some(Duration::ZERO));

        let retry_after = RateLimit {
            retry_after_secs: Some(7),
            reset_at: DateTime::from_timestamp(5_000, 0),
            ..Default::default()
        };
        assert_eq!(retry_after.wait_hint(now), Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_request_key() {
        assert_eq!(request_key("/repos/a/b", &[]), "repos/a/b");
        let query = [("sha", "main".to_string()), ("page", "2".to_string())];
        assert_eq!(request_key("repos/a/b/commits", &query), "repos/a/b/commits?sha=main&page=2");
    }
}
