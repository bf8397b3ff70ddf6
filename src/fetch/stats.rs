//! Per-commit line statistics
//!
//! GitHub computes stats for large commits lazily and answers 202 until they
//! are ready. That is retried a bounded number of times; a commit that never
//! becomes ready is reported as [`StatsOutcome::Pending`] so the caller can
//! skip it without failing the repository.

use crate::api::{decode_json, with_retry, ApiError, RemoteApi, RetryPolicy};
use crate::models::{short_sha, CommitStats, RepositoryDescriptor};
use crate::CancelToken;
use serde::Deserialize;
use tracing::debug;

const STILL_COMPUTING: u16 = 202;

/// `GET /repos/{owner}/{name}/commits/{sha}`; only the stats are read
#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    stats: Option<StatsPayload>,
}

#[derive(Debug, Deserialize)]
struct StatsPayload {
    additions: u64,
    deletions: u64,
    total: u64,
}

/// Result of fetching one commit's stats
#[derive(Debug, Clone, PartialEq)]
pub enum StatsOutcome {
    Ready(CommitStats),
    /// Still computing after every allowed attempt
    Pending { attempts: u32 },
    Failed(ApiError),
}

#[derive(Clone, Copy)]
pub struct StatsFetcher<'a> {
    api: &'a dyn RemoteApi,
    policy: &'a RetryPolicy,
}

impl<'a> StatsFetcher<'a> {
    pub fn new(api: &'a dyn RemoteApi, policy: &'a RetryPolicy) -> Self {
        Self { api, policy }
    }

    pub fn commit_stats(
        &self,
        repo: &RepositoryDescriptor,
        sha: &str,
        cancel: &CancelToken,
    ) -> StatsOutcome {
        let path = format!("{}/commits/{}", repo.api_path(), sha);
        let what = format!("{} stats for {}", repo, short_sha(sha));
        let max_attempts = self.policy.stats_attempts.max(1);

        for attempt in 1..=max_attempts {
            let body = with_retry(self.policy, cancel, &what, || self.api.get(&path, &[], cancel));
            match body {
                Ok(body) => return parse_stats(&body, &what),
                Err(e) if e.status() == Some(STILL_COMPUTING) => {
                    if attempt == max_attempts {
                        break;
                    }
                    let delay = self.policy.backoff(attempt);
                    debug!(
                        "{}: still computing ({}/{}), retrying in {:?}",
                        what, attempt, max_attempts, delay
                    );
                    if !cancel.sleep(delay) {
                        return StatsOutcome::Failed(ApiError::Cancelled);
                    }
                }
                Err(e) => return StatsOutcome::Failed(e),
            }
        }

        StatsOutcome::Pending {
            attempts: max_attempts,
        }
    }
}

fn parse_stats(body: &[u8], what: &str) -> StatsOutcome {
    let detail: CommitDetail = match decode_json(body, what) {
        Ok(detail) => detail,
        Err(e) => return StatsOutcome::Failed(e),
    };
    let Some(stats) = detail.stats else {
        return StatsOutcome::Failed(ApiError::Decode {
            what: what.to_string(),
            message: "response has no stats object".to_string(),
        });
    };

    let stats = CommitStats::new(stats.additions, stats.deletions, stats.total);
    if !stats.is_consistent() {
        debug!(
            "{}: total {} != additions {} + deletions {}, keeping reported total",
            what, stats.total, stats.additions, stats.deletions
        );
    }
    StatsOutcome::Ready(stats)
}
