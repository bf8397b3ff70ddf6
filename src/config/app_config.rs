//! commit-tally configuration file
//!
//! ```toml
//! [[repositories]]
//! owner = "rust-lang"
//! name = "cargo"
//! branch = "master"
//!
//! [api]
//! # token = "ghp_..."   # or GITHUB_TOKEN
//! per_page = 100
//!
//! [pipeline]
//! workers = 8
//! ```
//!
//! JSON with the same shape (`{"repositories": [...]}`) is accepted for
//! files ending in `.json`.

use super::ConfigError;
use crate::api::{ApiConfig, RetryPolicy, DEFAULT_BASE_URL};
use crate::fetch::MAX_PER_PAGE;
use crate::models::RepositoryDescriptor;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Files tried in the working directory when no path is given
pub const LOCAL_CONFIG_FILES: &[&str] = &["commit-tally.toml", "config.json"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryDescriptor>,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token; `GITHUB_TOKEN` takes priority
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connections kept open to the API host
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            user_agent: None,
            timeout_secs: default_timeout_secs(),
            max_connections: default_max_connections(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts per request on network errors, 429 and 5xx
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Attempts per commit while GitHub is still computing its stats
    #[serde(default = "default_stats_retries")]
    pub stats_retries: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_max_rate_limit_wait_secs")]
    pub max_rate_limit_wait_secs: u64,

    /// Stop issuing requests after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            stats_retries: default_stats_retries(),
            backoff_ms: default_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_rate_limit_wait_secs: default_max_rate_limit_wait_secs(),
            deadline_secs: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> usize {
    16
}

fn default_per_page() -> u32 {
    MAX_PER_PAGE
}

fn default_workers() -> usize {
    8
}

fn default_max_attempts() -> u32 {
    4
}

fn default_stats_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_rate_limit_wait_secs() -> u64 {
    15 * 60
}

impl AppConfig {
    /// Parse from a string; `.json` paths are JSON, everything else TOML
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            serde_json::from_str::<AppConfig>(content).map_err(|e| e.to_string())
        } else {
            toml::from_str::<AppConfig>(content).map_err(|e| e.to_string())
        };

        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content, path)?;
        config.validate()?;
        debug!(
            "Loaded {} repositories from {}",
            config.repositories.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repositories.is_empty() {
            return Err(ConfigError::Invalid(
                "no repositories configured".to_string(),
            ));
        }
        for (i, repo) in self.repositories.iter().enumerate() {
            if repo.owner.trim().is_empty() || repo.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "repository #{} needs both owner and name",
                    i + 1
                )));
            }
        }
        if !(1..=MAX_PER_PAGE).contains(&self.api.per_page) {
            return Err(ConfigError::Invalid(format!(
                "api.per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE, self.api.per_page
            )));
        }
        if self.api.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "api.max_connections must be at least 1".to_string(),
            ));
        }
        if !(1..=64).contains(&self.pipeline.workers) {
            return Err(ConfigError::Invalid(format!(
                "pipeline.workers must be between 1 and 64, got {}",
                self.pipeline.workers
            )));
        }
        if self.pipeline.max_attempts == 0 || self.pipeline.stats_retries == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_attempts and pipeline.stats_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Token from `env_token` when set, else from the file
    pub fn with_token(mut self, env_token: Option<String>) -> Self {
        if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
            self.api.token = Some(token);
        }
        self
    }

    pub fn api_config(&self) -> ApiConfig {
        let defaults = ApiConfig::default();
        ApiConfig {
            base_url: self.api.base_url.clone(),
            token: self.api.token.clone(),
            user_agent: self.api.user_agent.clone().unwrap_or(defaults.user_agent),
            timeout: Duration::from_secs(self.api.timeout_secs.max(1)),
            max_connections: self.api.max_connections,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.pipeline.max_attempts,
            base_delay: Duration::from_millis(self.pipeline.backoff_ms),
            max_delay: Duration::from_millis(self.pipeline.max_backoff_ms),
            max_rate_limit_wait: Duration::from_secs(self.pipeline.max_rate_limit_wait_secs),
            stats_attempts: self.pipeline.stats_retries,
            jitter: true,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.pipeline.workers,
            buffer_size: self.pipeline.workers * 4,
            per_page: self.api.per_page,
            retry: self.retry_policy(),
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.pipeline.deadline_secs.map(Duration::from_secs)
    }

    /// `~/.config/commit-tally/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("commit-tally").join("config.toml"))
    }
}

/// Locate and load the configuration.
///
/// An explicit path must exist. Otherwise the working directory files in
/// [`LOCAL_CONFIG_FILES`] are tried, then the user config directory.
pub fn load_config(explicit: Option<&Path>) -> Result<(AppConfig, PathBuf), ConfigError> {
    if let Some(path) = explicit {
        return AppConfig::from_file(path).map(|c| (c, path.to_path_buf()));
    }

    let mut candidates: Vec<PathBuf> = LOCAL_CONFIG_FILES.iter().map(PathBuf::from).collect();
    if let Some(user) = AppConfig::user_config_path() {
        candidates.push(user);
    }

    match candidates.iter().find(|p| p.is_file()) {
        Some(path) => AppConfig::from_file(path).map(|c| (c, path.clone())),
        None => Err(ConfigError::NotFound(candidates)),
    }
}

/// Example file written by `commit-tally init`
pub const EXAMPLE_CONFIG: &str = r#"# commit-tally configuration

[[repositories]]
owner = "rust-lang"
name = "cargo"
branch = "master"

# [[repositories]]
# owner = "your-org"
# name = "your-repo"
# branch = ""          # empty = default branch

[api]
# base_url = "https://api.github.com/"   # GitHub Enterprise: https://host/api/v3/
# token = "ghp_..."                       # prefer the GITHUB_TOKEN env var
per_page = 100
timeout_secs = 30
max_connections = 16

[pipeline]
workers = 8
max_attempts = 4
stats_retries = 3
# deadline_secs = 600
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plain_json_format() {
        let json = r#"{
            "repositories": [
                {"owner": "acme", "name": "widgets", "branch": "main"},
                {"owner": "acme", "name": "gadgets", "branch": "develop"}
            ]
        }"#;
        let config = AppConfig::parse(json, Path::new("config.json")).unwrap();
        assert_eq!(config.repositories.len(), 2);
        assert_eq!(config.repositories[1].branch, "develop");
        assert_eq!(config.api.per_page, 100);
        assert_eq!(config.pipeline.workers, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_with_overrides() {
        let toml_str = r#"
[[repositories]]
owner = "acme"
name = "widgets"

[api]
base_url = "https://ghe.example.com/api/v3/"
token = "file-token"
per_page = 50

[pipeline]
workers = 16
stats_retries = 5
deadline_secs = 120
"#;
        let config = AppConfig::parse(toml_str, Path::new("commit-tally.toml")).unwrap();
        assert!(config.repositories[0].branch.is_empty());
        assert_eq!(config.api.per_page, 50);
        assert_eq!(config.api.token.as_deref(), Some("file-token"));
        assert_eq!(config.deadline(), Some(Duration::from_secs(120)));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.workers, 16);
        assert_eq!(pipeline.per_page, 50);
        assert_eq!(pipeline.retry.stats_attempts, 5);
        assert_eq!(pipeline.retry.max_attempts, 4);

        let api = config.api_config();
        assert_eq!(api.base_url, "https://ghe.example.com/api/v3/");
        assert!(api.user_agent.starts_with("commit-tally/"));
    }

    #[test]
    fn test_env_token_overrides_file() {
        let mut config = AppConfig::default();
        config.api.token = Some("file-token".into());

        let config = config.with_token(Some("env-token".into()));
        assert_eq!(config.api.token.as_deref(), Some("env-token"));

        let config = config.with_token(Some("  ".into()));
        assert_eq!(config.api.token.as_deref(), Some("env-token"));
    }

    #[test]
    fn test_token_never_serialized() {
        let mut config = AppConfig::default();
        config.api.token = Some("secret".into());
        let out = toml::to_string(&config).unwrap();
        assert!(!out.contains("secret"));
    }

    #[test]
    fn test_validation() {
        let empty = AppConfig::default();
        assert!(matches!(empty.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig {
            repositories: vec![RepositoryDescriptor::new("acme", "", "main")],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.repositories = vec![RepositoryDescriptor::new("acme", "widgets", "main")];
        assert!(config.validate().is_ok());

        config.api.per_page = 101;
        assert!(config.validate().is_err());
        config.api.per_page = 100;

        config.pipeline.workers = 0;
        assert!(config.validate().is_err());
        config.pipeline.workers = 65;
        assert!(config.validate().is_err());
        config.pipeline.workers = 8;

        config.pipeline.stats_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let err = AppConfig::parse("{ not json", Path::new("config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_from_file_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commit-tally.toml");
        std::fs::write(&path, EXAMPLE_CONFIG).unwrap();

        let (config, loaded_from) = load_config(Some(&path)).unwrap();
        assert_eq!(loaded_from, path);
        assert_eq!(config.repositories[0].full_name(), "rust-lang/cargo");

        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }
}
