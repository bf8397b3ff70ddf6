//! Paginated commit listing for one repository/branch

use crate::api::{decode_json, with_retry, ApiResult, RemoteApi, RetryPolicy};
use crate::models::{AuthorRef, Commit, RepositoryDescriptor};
use crate::CancelToken;
use serde::Deserialize;
use std::collections::VecDeque;
use tracing::debug;

/// GitHub caps `per_page` at 100
pub const MAX_PER_PAGE: u32 = 100;

/// Element of `GET /repos/{owner}/{name}/commits`
#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    /// Linked account; `null` when the commit email matches no account
    #[serde(default)]
    author: Option<AccountPayload>,
    #[serde(default)]
    commit: Option<GitCommitPayload>,
}

#[derive(Debug, Deserialize)]
struct AccountPayload {
    #[serde(default)]
    login: String,
    #[serde(default)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct GitCommitPayload {
    #[serde(default)]
    author: Option<SignaturePayload>,
}

#[derive(Debug, Deserialize)]
struct SignaturePayload {
    #[serde(default)]
    name: String,
}

impl From<CommitItem> for Commit {
    fn from(item: CommitItem) -> Self {
        let author = match item.author {
            Some(account) => AuthorRef::new(account.login, account.id),
            // No linked account: fall back to the git author name
            None => {
                let name = item
                    .commit
                    .and_then(|c| c.author)
                    .map(|sig| sig.name)
                    .unwrap_or_default();
                AuthorRef::new(name, 0)
            }
        };
        Commit::new(item.sha, author)
    }
}

/// Lists commits through a [`RemoteApi`]
#[derive(Clone, Copy)]
pub struct CommitFetcher<'a> {
    api: &'a dyn RemoteApi,
    policy: &'a RetryPolicy,
    per_page: u32,
}

impl<'a> CommitFetcher<'a> {
    pub fn new(api: &'a dyn RemoteApi, policy: &'a RetryPolicy, per_page: u32) -> Self {
        Self {
            api,
            policy,
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Lazily walk every commit reachable from `repo.branch`.
    ///
    /// Pages are requested as iteration proceeds. Each call starts over from
    /// page 1, so callers that need the list twice must collect it.
    pub fn list_commits(
        &self,
        repo: &'a RepositoryDescriptor,
        cancel: &'a CancelToken,
    ) -> CommitPages<'a> {
        CommitPages {
            fetcher: *self,
            repo,
            cancel,
            next_page: Some(1),
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }
}

/// Iterator over the commits of one branch, one page at a time
///
/// Fused after the first error.
pub struct CommitPages<'a> {
    fetcher: CommitFetcher<'a>,
    repo: &'a RepositoryDescriptor,
    cancel: &'a CancelToken,
    next_page: Option<u32>,
    buffer: VecDeque<Commit>,
    pages_fetched: u32,
}

impl CommitPages<'_> {
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn fetch_page(&self, page: u32) -> ApiResult<Vec<CommitItem>> {
        let path = format!("{}/commits", self.repo.api_path());
        let mut query = Vec::with_capacity(3);
        if !self.repo.branch.is_empty() {
            query.push(("sha", self.repo.branch.clone()));
        }
        query.push(("per_page", self.fetcher.per_page.to_string()));
        query.push(("page", page.to_string()));

        let what = format!("{} commits page {}", self.repo, page);
        let body = with_retry(self.fetcher.policy, self.cancel, &what, || {
            self.fetcher.api.get(&path, &query, self.cancel)
        });

        match body {
            Ok(body) => decode_json(&body, &what),
            // GitHub answers 409 "Git Repository is empty"
            Err(e) if page == 1 && e.status() == Some(409) => {
                debug!("{}: repository is empty", self.repo);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl Iterator for CommitPages<'_> {
    type Item = ApiResult<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(commit) = self.buffer.pop_front() {
                return Some(Ok(commit));
            }

            let page = self.next_page?;
            match self.fetch_page(page) {
                Ok(items) => {
                    self.pages_fetched += 1;
                    // A short page is the last one
                    self.next_page = if items.len() < self.fetcher.per_page as usize {
                        None
                    } else {
                        Some(page + 1)
                    };
                    debug!("{}: page {} -> {} commits", self.repo, page, items.len());
                    self.buffer.extend(items.into_iter().map(Commit::from));
                }
                Err(e) => {
                    self.next_page = None;
                    self.buffer.clear();
                    return Some(Err(e));
                }
            }
        }
    }
}
