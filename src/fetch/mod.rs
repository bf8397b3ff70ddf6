//! Commit listing and per-commit stats retrieval
//!
//! Both fetchers borrow a [`RemoteApi`](crate::api::RemoteApi) and a
//! [`RetryPolicy`](crate::api::RetryPolicy); neither owns network state.

pub mod commits;
pub mod stats;

pub use commits::{CommitFetcher, CommitPages, MAX_PER_PAGE};
pub use stats::{StatsFetcher, StatsOutcome};
