//! Bounded retry with exponential backoff and rate-limit waits

use super::{ApiError, ApiResult};
use crate::CancelToken;
use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per request for network, 429 and 5xx failures (including the first)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Longest we are willing to sleep for a rate-limit reset
    pub max_rate_limit_wait: Duration,
    /// Attempts allowed while GitHub is still computing a commit's stats (HTTP 202)
    pub stats_attempts: u32,
    /// Randomize delays by +/-25%
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_rate_limit_wait: Duration::from_secs(15 * 60),
            stats_attempts: 3,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy with no sleeping between attempts
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::rng().random_range(0.75..=1.25);
        delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out
/// of attempts. Rate-limited responses sleep until the advertised reset.
pub fn with_retry<T>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    what: &str,
    mut op: impl FnMut() -> ApiResult<T>,
) -> ApiResult<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let err = match op() {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() || attempt >= max_attempts {
            return Err(err);
        }

        let delay = match &err {
            ApiError::RateLimited { rate_limit, .. } => {
                let wait = rate_limit.wait_hint(Utc::now()).unwrap_or_else(|| policy.backoff(attempt));
                if wait > policy.max_rate_limit_wait {
                    warn!(
                        "{}: rate limit resets in {}s, longer than the {}s we are allowed to wait",
                        what,
                        wait.as_secs(),
                        policy.max_rate_limit_wait.as_secs()
                    );
                    return Err(err);
                }
                warn!("{}: rate limited, waiting {}s", what, wait.as_secs());
                wait
            }
            _ => policy.backoff(attempt),
        };

        debug!(
            "{}: attempt {}/{} failed ({}), retrying in {:?}",
            what, attempt, max_attempts, err, delay
        );
        if !cancel.sleep(delay) {
            return Err(ApiError::Cancelled);
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{classify_status, RateLimit};
    use std::cell::Cell;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let d = policy.backoff(1);
            assert!(d >= Duration::from_millis(75) && d <= Duration::from_millis(125));
        }
    }

    #[test]
    fn test_retries_transient_errors() {
        let calls = Cell::new(0);
        let result = with_retry(&RetryPolicy::immediate(), &CancelToken::new(), "test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(ApiError::Network("connection reset".into()))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: ApiResult<()> =
            with_retry(&RetryPolicy::immediate(), &CancelToken::new(), "test", || {
                calls.set(calls.get() + 1);
                Err(classify_status(503, None))
            });
        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_fatal_status_not_retried() {
        let calls = Cell::new(0);
        let result: ApiResult<()> =
            with_retry(&RetryPolicy::immediate(), &CancelToken::new(), "test", || {
                calls.set(calls.get() + 1);
                Err(classify_status(404, None))
            });
        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_rate_limit_waits_then_resumes() {
        let calls = Cell::new(0);
        let result = with_retry(&RetryPolicy::immediate(), &CancelToken::new(), "test", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(ApiError::RateLimited {
                    code: 429,
                    rate_limit: RateLimit {
                        retry_after_secs: Some(0),
                        ..Default::default()
                    },
                })
            } else {
                Ok("page")
            }
        });
        assert_eq!(result, Ok("page"));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_too_many_requests_waits_for_reset() {
        let reset_at = Utc::now() + chrono::Duration::milliseconds(1500);
        let calls = Cell::new(0);
        let started = std::time::Instant::now();
        let result = with_retry(&RetryPolicy::immediate(), &CancelToken::new(), "test", || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(classify_status(
                    429,
                    Some(RateLimit {
                        reset_at: Some(reset_at),
                        ..Default::default()
                    }),
                ))
            } else {
                Ok("page")
            }
        });
        assert_eq!(result, Ok("page"));
        assert_eq!(calls.get(), 2);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[test]
    fn test_rate_limit_reset_too_far_away() {
        let policy = RetryPolicy {
            max_rate_limit_wait: Duration::from_secs(1),
            ..RetryPolicy::immediate()
        };
        let calls = Cell::new(0);
        let result: ApiResult<()> = with_retry(&policy, &CancelToken::new(), "test", || {
            calls.set(calls.get() + 1);
            Err(ApiError::RateLimited {
                code: 403,
                rate_limit: RateLimit {
                    remaining: Some(0),
                    retry_after_secs: Some(3600),
                    ..Default::default()
                },
            })
        });
        assert!(matches!(result, Err(ApiError::RateLimited { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cancelled_before_first_attempt() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result: ApiResult<()> =
            with_retry(&RetryPolicy::immediate(), &cancel, "test", || panic!("must not run"));
        assert_eq!(result, Err(ApiError::Cancelled));
    }
}
