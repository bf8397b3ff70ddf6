//! CLI command definitions and handlers

mod init;
mod tally;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// commit-tally - per-author commit statistics for GitHub repositories
#[derive(Parser, Debug)]
#[command(name = "commit-tally")]
#[command(
    version,
    about = "Aggregate lines added, deleted and commits per author across GitHub repositories",
    after_help = "\
Examples:
  commit-tally init                          Write an example commit-tally.toml
  commit-tally                               Run with ./commit-tally.toml or ./config.json
  commit-tally --config repos.json -f json   JSON output for scripting
  commit-tally --deadline 300                Stop issuing requests after 5 minutes

Set GITHUB_TOKEN to raise the API rate limit from 60 to 5000 requests per hour."
)]
pub struct Cli {
    /// Configuration file (default: ./commit-tally.toml, ./config.json, then the user config dir)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Output format: text, json
    #[arg(long, short = 'f', global = true, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Output file path (default: stdout)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    /// Number of concurrent stats requests (1-64), overrides the config file
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    /// Stop issuing new requests after this many seconds
    #[arg(long, global = true)]
    pub deadline: Option<u64>,

    /// GitHub token (overrides the config file)
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Exit with code 1 if any commit was skipped
    #[arg(long, global = true)]
    pub fail_on_skipped: bool,

    /// Hide the progress bar
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, aggregate and report (the default)
    Run,

    /// Write an example configuration file
    Init {
        /// Where to write it
        #[arg(default_value = "commit-tally.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Init { path, force }) => init::run(&path, force),
        Some(Commands::Run) | None => tally::run(cli.config.as_deref(), &cli.run),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers("8"), Ok(8));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_run() {
        let cli = Cli::try_parse_from(["commit-tally", "--format", "json", "--workers", "4"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.format, "json");
        assert_eq!(cli.run.workers, Some(4));
    }

    #[test]
    fn test_init_subcommand() {
        let cli = Cli::try_parse_from(["commit-tally", "init", "repos.toml", "--force"]).unwrap();
        match cli.command {
            Some(Commands::Init { path, force }) => {
                assert_eq!(path, PathBuf::from("repos.toml"));
                assert!(force);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
