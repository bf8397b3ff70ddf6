//! Core data models for commit-tally
//!
//! Repository descriptors come from configuration; commits, authors and
//! commit stats are decoded from API responses and are read-only downstream.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// One tracked repository/branch pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    pub owner: String,
    pub name: String,
    /// Branch to walk. Empty means the repository's default branch.
    #[serde(default)]
    pub branch: String,
}

impl RepositoryDescriptor {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: branch.into(),
        }
    }

    /// `repos/{owner}/{name}`
    pub fn api_path(&self) -> String {
        format!("repos/{}/{}", self.owner, self.name)
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.branch.is_empty() {
            write!(f, "{}/{}", self.owner, self.name)
        } else {
            write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
        }
    }
}

/// Account credited with a commit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(default)]
    pub login: String,
    /// Stable account id. Zero when the commit has no linked account.
    #[serde(default)]
    pub id: u64,
}

impl AuthorRef {
    pub fn new(login: impl Into<String>, id: u64) -> Self {
        Self {
            login: login.into(),
            id,
        }
    }

    /// Aggregation key: the id when present, else the login.
    pub fn key(&self) -> AuthorKey {
        if self.id != 0 {
            AuthorKey::Id(self.id)
        } else if !self.login.is_empty() {
            AuthorKey::Login(self.login.clone())
        } else {
            AuthorKey::Anonymous
        }
    }
}

/// Identity under which a commit's stats are accumulated
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthorKey {
    Id(u64),
    Login(String),
    Anonymous,
}

impl fmt::Display for AuthorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorKey::Id(id) => write!(f, "{}", id),
            AuthorKey::Login(login) => write!(f, "login:{}", login),
            AuthorKey::Anonymous => write!(f, "anonymous"),
        }
    }
}

// Map keys in JSON must be strings
impl Serialize for AuthorKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A commit reachable from a tracked branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub sha: String,
    pub author: AuthorRef,
}

impl Commit {
    pub fn new(sha: impl Into<String>, author: AuthorRef) -> Self {
        Self {
            sha: sha.into(),
            author,
        }
    }

    /// First 7 characters of the sha, for display
    pub fn short_sha(&self) -> &str {
        short_sha(&self.sha)
    }
}

pub fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Line-change counts for one commit
///
/// `total` is taken as reported and never recomputed, even when it disagrees
/// with `additions + deletions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

impl CommitStats {
    pub fn new(additions: u64, deletions: u64, total: u64) -> Self {
        Self {
            additions,
            deletions,
            total,
        }
    }

    /// Whether `total == additions + deletions`
    pub fn is_consistent(&self) -> bool {
        self.additions.checked_add(self.deletions) == Some(self.total)
    }
}

/// Accumulated metric names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Additions,
    Deletions,
    Total,
    Commits,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Additions,
        Metric::Deletions,
        Metric::Total,
        Metric::Commits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Additions => "additions",
            Metric::Deletions => "deletions",
            Metric::Total => "total",
            Metric::Commits => "commits",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
