//! Default command: load config, run the pipeline, render the report

use super::RunArgs;
use anyhow::{Context, Result};
use commit_tally::api::GithubClient;
use commit_tally::config::load_config;
use commit_tally::models::RepositoryDescriptor;
use commit_tally::pipeline::{run_pipeline, RepoStatus, RunReport};
use commit_tally::reporters;
use commit_tally::CancelToken;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Create bar progress style
fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

pub fn run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    // Configuration errors abort before any request is made
    let (mut config, loaded_from) = load_config(config_path)?;
    info!("Using configuration from {}", loaded_from.display());

    config = config.with_token(args.token.clone());
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }
    if let Some(deadline) = args.deadline {
        config.pipeline.deadline_secs = Some(deadline);
    }

    if config.api.token.is_none() {
        eprintln!(
            "{}No GITHUB_TOKEN set; unauthenticated requests are limited to 60 per hour",
            style("⚠ ").yellow()
        );
    }

    let client = GithubClient::new(config.api_config()).context("Failed to create API client")?;
    let cancel = match config.deadline() {
        Some(deadline) => CancelToken::with_deadline(deadline),
        None => CancelToken::new(),
    };

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(create_bar_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };
    let progress = |repo: &RepositoryDescriptor, done: usize, total: usize| {
        if done == 0 {
            bar.set_message(repo.to_string());
            bar.set_length(total as u64);
        }
        bar.set_position(done as u64);
    };

    let report = run_pipeline(
        &client,
        &config.repositories,
        &config.pipeline_config(),
        &cancel,
        Some(&progress),
    );
    bar.finish_and_clear();

    let output = reporters::report(&report, &args.format)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} Report written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => println!("{}", output),
    }

    if should_fail(&report, args.fail_on_skipped) {
        std::process::exit(1);
    }
    Ok(())
}

/// Every repository failed, or commits were skipped under `--fail-on-skipped`
fn should_fail(report: &RunReport, fail_on_skipped: bool) -> bool {
    if report.all_failed() {
        return true;
    }
    fail_on_skipped
        && (report.failed_commits > 0
            || report.count(RepoStatus::Failed) > 0
            || report.count(RepoStatus::Cancelled) > 0)
}
