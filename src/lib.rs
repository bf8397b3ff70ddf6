//! commit-tally - per-author commit statistics for GitHub repositories
//!
//! Lists the commits of every configured repository, fetches the line
//! statistics of each commit on a bounded worker pool, and folds them into
//! per-author totals keyed by the stable account id.
//!
//! # Example
//!
//! ```no_run
//! use commit_tally::api::{ApiConfig, GithubClient};
//! use commit_tally::models::RepositoryDescriptor;
//! use commit_tally::pipeline::{run_pipeline, PipelineConfig};
//! use commit_tally::CancelToken;
//!
//! let client = GithubClient::new(ApiConfig::default()).unwrap();
//! let repos = vec![RepositoryDescriptor::new("rust-lang", "cargo", "master")];
//! let report = run_pipeline(&client, &repos, &PipelineConfig::default(), &CancelToken::new(), None);
//! println!("{} authors", report.authors.len());
//! ```

pub mod aggregate;
pub mod api;
mod cancel;
pub mod config;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod reporters;

pub use aggregate::{AggregationTable, Aggregator};
pub use cancel::CancelToken;
