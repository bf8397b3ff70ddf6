//! Outcome of a pipeline run

use crate::aggregate::AggregationTable;
use crate::api::ApiError;
use crate::models::{AuthorKey, Metric, RepositoryDescriptor};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Listing a repository's commits failed; nothing from it was aggregated
#[derive(Error, Debug, Clone, PartialEq)]
#[error("repository {repository} failed: {source}")]
pub struct RepositoryFailure {
    pub repository: RepositoryDescriptor,
    #[source]
    pub source: ApiError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoStatus {
    /// Every listed commit was aggregated
    Complete,
    /// Some commits were skipped
    Partial,
    /// Commits could not be listed
    Failed,
    /// The run was cancelled before this repository's commits were listed
    Cancelled,
}

impl std::fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoStatus::Complete => write!(f, "complete"),
            RepoStatus::Partial => write!(f, "partial"),
            RepoStatus::Failed => write!(f, "failed"),
            RepoStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a commit contributed nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// GitHub was still computing stats after every allowed attempt
    StillComputing { attempts: u32 },
    Failed { error: String },
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::StillComputing { attempts } => {
                write!(f, "stats still computing after {} attempts", attempts)
            }
            SkipReason::Failed { error } => write!(f, "{}", error),
            SkipReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<ApiError> for SkipReason {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Cancelled => SkipReason::Cancelled,
            other => SkipReason::Failed {
                error: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedCommit {
    pub sha: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoReport {
    pub repository: RepositoryDescriptor,
    pub status: RepoStatus,
    pub commits_listed: usize,
    pub commits_aggregated: usize,
    pub skipped: Vec<SkippedCommit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RepoReport {
    /// Listing did not finish; a cancellation is not counted as a failure
    pub(crate) fn failed(failure: RepositoryFailure) -> Self {
        let (status, error) = match failure.source {
            ApiError::Cancelled => (RepoStatus::Cancelled, None),
            source => (RepoStatus::Failed, Some(source.to_string())),
        };
        Self {
            error,
            repository: failure.repository,
            status,
            commits_listed: 0,
            commits_aggregated: 0,
            skipped: Vec::new(),
        }
    }

    pub(crate) fn finished(
        repository: RepositoryDescriptor,
        commits_listed: usize,
        commits_aggregated: usize,
        skipped: Vec<SkippedCommit>,
    ) -> Self {
        let status = if skipped.is_empty() {
            RepoStatus::Complete
        } else {
            RepoStatus::Partial
        };
        Self {
            repository,
            status,
            commits_listed,
            commits_aggregated,
            skipped,
            error: None,
        }
    }
}

/// Everything a caller needs to print or store the result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub repositories: Vec<RepoReport>,
    pub authors: AggregationTable,
    /// First login seen per author key, for display
    pub logins: HashMap<AuthorKey, String>,
    /// Commits skipped across all repositories
    pub failed_commits: usize,
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn count(&self, status: RepoStatus) -> usize {
        self.repositories
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn all_failed(&self) -> bool {
        !self.repositories.is_empty() && self.count(RepoStatus::Failed) == self.repositories.len()
    }

    pub fn commits_aggregated(&self) -> u64 {
        self.authors.sum(Metric::Commits)
    }

    /// Display name for an author key
    pub fn display_name(&self, key: &AuthorKey) -> String {
        match (key, self.logins.get(key)) {
            (AuthorKey::Id(id), Some(login)) => format!("{} ({})", login, id),
            (AuthorKey::Login(login), _) => login.clone(),
            (key, _) => key.to_string(),
        }
    }
}
