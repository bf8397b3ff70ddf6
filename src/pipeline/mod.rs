//! Aggregation pipeline
//!
//! Orchestrates a full run:
//! 1. List the commits of each configured repository
//! 2. Fetch per-commit stats on a bounded worker pool
//! 3. Fold the stats into the per-author table
//!
//! # Concurrency Model
//!
//! ```text
//!   producer ──bounded(buffer)──▶ N stats workers ──bounded(buffer)──▶ consumer
//!   (commits)                     (HTTP, retries)                     (dedup, record,
//!                                                                      skipped list)
//! ```
//!
//! Repositories are processed one after another; all workers share one
//! client and therefore one connection pool. A failure listing one
//! repository does not affect the others, and a failed commit only removes
//! that commit's contribution.

mod report;

pub use report::{
    RepoReport, RepoStatus, RepositoryFailure, RunReport, SkipReason, SkippedCommit,
};

use crate::aggregate::Aggregator;
use crate::api::{ApiError, RemoteApi, RetryPolicy};
use crate::fetch::{CommitFetcher, StatsFetcher, StatsOutcome, MAX_PER_PAGE};
use crate::models::{Commit, RepositoryDescriptor};
use crate::CancelToken;
use crossbeam_channel::bounded;
use std::collections::HashSet;
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Progress callback: repository, commits done, commits listed
pub type ProgressFn<'a> = &'a (dyn Fn(&RepositoryDescriptor, usize, usize) + Sync);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent stats requests (1-64)
    pub workers: usize,
    /// Channel capacity between stages
    pub buffer_size: usize,
    pub per_page: u32,
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            buffer_size: 64,
            per_page: MAX_PER_PAGE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Run the whole pipeline over `repos`.
///
/// Never fails as a whole: per-repository and per-commit failures are
/// recorded in the returned report. When `cancel` fires, no new requests are
/// issued and everything aggregated so far is still reported.
pub fn run_pipeline(
    api: &dyn RemoteApi,
    repos: &[RepositoryDescriptor],
    config: &PipelineConfig,
    cancel: &CancelToken,
    progress: Option<ProgressFn<'_>>,
) -> RunReport {
    let started = Instant::now();
    let aggregator = Aggregator::new();

    info!(
        "Aggregating {} repositories with {} workers",
        repos.len(),
        config.workers
    );

    let mut repositories = Vec::with_capacity(repos.len());
    for repo in repos {
        let report = process_repository(api, repo, config, cancel, &aggregator, progress);
        match report.status {
            RepoStatus::Failed => warn!(
                "{}: failed ({})",
                repo,
                report.error.as_deref().unwrap_or("unknown error")
            ),
            status => info!(
                "{}: {} ({} of {} commits aggregated)",
                repo, status, report.commits_aggregated, report.commits_listed
            ),
        }
        repositories.push(report);
    }

    let failed_commits = repositories.iter().map(|r| r.skipped.len()).sum();
    RunReport {
        repositories,
        authors: aggregator.snapshot(),
        logins: aggregator.logins(),
        failed_commits,
        cancelled: cancel.is_cancelled(),
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

/// List, fetch and fold one repository
pub fn process_repository(
    api: &dyn RemoteApi,
    repo: &RepositoryDescriptor,
    config: &PipelineConfig,
    cancel: &CancelToken,
    aggregator: &Aggregator,
    progress: Option<ProgressFn<'_>>,
) -> RepoReport {
    let commits = match list_unique_commits(api, repo, config, cancel) {
        Ok(commits) => commits,
        Err(failure) => return RepoReport::failed(failure),
    };

    let listed = commits.len();
    debug!("{}: {} commits listed", repo, listed);
    if let Some(cb) = progress {
        cb(repo, 0, listed);
    }
    if listed == 0 {
        return RepoReport::finished(repo.clone(), 0, 0, Vec::new());
    }

    let stats_fetcher = StatsFetcher::new(api, &config.retry);
    let num_workers = config.workers.clamp(1, listed);
    let buffer_size = config.buffer_size.max(1);

    let mut folded: HashSet<String> = HashSet::with_capacity(listed);
    let mut skipped = Vec::new();
    let mut done = 0;

    thread::scope(|s| {
        let (commit_tx, commit_rx) = bounded::<Commit>(buffer_size);
        let (result_tx, result_rx) = bounded::<(Commit, StatsOutcome)>(buffer_size);

        // Producer: feed commits
        s.spawn(move || {
            for commit in commits {
                if commit_tx.send(commit).is_err() {
                    break; // Workers gone
                }
            }
        });

        // Workers: fetch stats in parallel
        for _ in 0..num_workers {
            let rx = commit_rx.clone();
            let tx = result_tx.clone();
            let fetcher = &stats_fetcher;
            s.spawn(move || {
                for commit in rx {
                    // Drain without touching the network once cancelled
                    let outcome = if cancel.is_cancelled() {
                        StatsOutcome::Failed(ApiError::Cancelled)
                    } else {
                        fetcher.commit_stats(repo, &commit.sha, cancel)
                    };
                    if tx.send((commit, outcome)).is_err() {
                        break; // Consumer closed
                    }
                }
            });
        }

        // Drop our copies so the consumer sees completion
        drop(commit_rx);
        drop(result_tx);

        // Consumer: single owner of the dedup set and skipped list
        for (commit, outcome) in result_rx {
            done += 1;
            match outcome {
                StatsOutcome::Ready(stats) => {
                    if folded.insert(commit.sha.clone()) {
                        aggregator.record(&commit.author, &stats);
                    } else {
                        debug!("{}: {} already folded", repo, commit.short_sha());
                    }
                }
                StatsOutcome::Pending { attempts } => {
                    warn!(
                        "{}: skipping {}, stats still computing after {} attempts",
                        repo,
                        commit.short_sha(),
                        attempts
                    );
                    skipped.push(SkippedCommit {
                        sha: commit.sha,
                        reason: SkipReason::StillComputing { attempts },
                    });
                }
                StatsOutcome::Failed(err) => {
                    let reason = SkipReason::from(err);
                    if reason != SkipReason::Cancelled {
                        warn!("{}: skipping {}: {}", repo, commit.short_sha(), reason);
                    }
                    skipped.push(SkippedCommit {
                        sha: commit.sha,
                        reason,
                    });
                }
            }

            if let Some(cb) = progress {
                cb(repo, done, listed);
            }
        }
    });

    RepoReport::finished(repo.clone(), listed, folded.len(), skipped)
}

/// Materialize the commit list, dropping shas seen on an earlier page
/// (new pushes during pagination shift page boundaries).
fn list_unique_commits(
    api: &dyn RemoteApi,
    repo: &RepositoryDescriptor,
    config: &PipelineConfig,
    cancel: &CancelToken,
) -> Result<Vec<Commit>, RepositoryFailure> {
    let fetcher = CommitFetcher::new(api, &config.retry, config.per_page);
    let mut seen = HashSet::new();
    let mut commits = Vec::new();

    for commit in fetcher.list_commits(repo, cancel) {
        let commit = commit.map_err(|source| RepositoryFailure {
            repository: repo.clone(),
            source,
        })?;
        if seen.insert(commit.sha.clone()) {
            commits.push(commit);
        }
    }
    Ok(commits)
}
