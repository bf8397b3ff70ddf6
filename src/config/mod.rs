//! Configuration module for commit-tally
//!
//! This module handles:
//! - The repository list (`[[repositories]]`)
//! - API connection settings (`[api]`)
//! - Worker pool and retry tuning (`[pipeline]`)
//!
//! Configuration errors are fatal and surface before any network activity.

mod app_config;

pub use app_config::{
    load_config, ApiSettings, AppConfig, PipelineSettings, EXAMPLE_CONFIG, LOCAL_CONFIG_FILES,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("no configuration file found (tried {})", display_paths(.0))]
    NotFound(Vec<PathBuf>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
