//! Text (terminal) reporter with colors and formatting

use crate::models::{short_sha, Metric};
use crate::pipeline::{RepoStatus, RunReport};
use anyhow::Result;

/// Status colors (ANSI escape codes)
fn status_color(status: RepoStatus) -> &'static str {
    match status {
        RepoStatus::Complete => "\x1b[32m", // Green
        RepoStatus::Partial => "\x1b[33m",  // Yellow
        RepoStatus::Failed => "\x1b[31m",   // Red
        RepoStatus::Cancelled => "\x1b[2m", // Dim
    }
}

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Skipped shas listed per repository before eliding
const MAX_SKIPPED_SHOWN: usize = 20;

/// Render report as formatted terminal output
pub fn render(report: &RunReport) -> Result<String> {
    let mut out = String::new();

    // Header
    out.push_str(&format!("\n{BOLD}commit-tally{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Repositories: {}  Complete: {}  Partial: {}  Failed: {}\n",
        report.repositories.len(),
        report.count(RepoStatus::Complete),
        report.count(RepoStatus::Partial),
        report.count(RepoStatus::Failed),
    ));
    let not_started = report.count(RepoStatus::Cancelled);
    if not_started > 0 {
        out.push_str(&format!("Not started (cancelled): {}\n", not_started));
    }
    out.push_str(&format!(
        "Authors: {}  Commits: {}  Skipped: {}  Time: {:.1}s\n",
        report.authors.len(),
        report.commits_aggregated(),
        report.failed_commits,
        report.elapsed_ms as f64 / 1000.0,
    ));
    if report.cancelled {
        out.push_str(&format!(
            "\x1b[33m{BOLD}Run was cancelled; totals are partial.{RESET}\n"
        ));
    }

    // Repositories
    out.push_str(&format!("\n{BOLD}Repositories{RESET}\n"));
    for repo in &report.repositories {
        let color = status_color(repo.status);
        out.push_str(&format!(
            "  {color}{:<9}{RESET} {}",
            repo.status.to_string(),
            repo.repository
        ));
        match &repo.error {
            Some(error) => out.push_str(&format!("  {DIM}{}{RESET}\n", error)),
            None => out.push_str(&format!(
                "  {DIM}{}/{} commits{RESET}\n",
                repo.commits_aggregated, repo.commits_listed
            )),
        }

        for skipped in repo.skipped.iter().take(MAX_SKIPPED_SHOWN) {
            out.push_str(&format!(
                "      {DIM}skipped{RESET} {}  {}\n",
                short_sha(&skipped.sha),
                skipped.reason
            ));
        }
        if repo.skipped.len() > MAX_SKIPPED_SHOWN {
            out.push_str(&format!(
                "      {DIM}... and {} more (use --format json for the full list){RESET}\n",
                repo.skipped.len() - MAX_SKIPPED_SHOWN
            ));
        }
    }

    // Authors
    if report.authors.is_empty() {
        out.push_str(&format!("\n{DIM}No commits aggregated.{RESET}\n"));
        return Ok(out);
    }

    out.push_str(&format!(
        "\n{BOLD}{:<32} {:>9} {:>11} {:>11} {:>11}{RESET}\n",
        "Author", "Commits", "Additions", "Deletions", "Total"
    ));
    for (key, totals) in report.authors.ranked() {
        let value = |m: Metric| totals.get(&m).copied().unwrap_or(0);
        out.push_str(&format!(
            "{:<32} {:>9} \x1b[32m{:>11}{RESET} \x1b[31m{:>11}{RESET} {:>11}\n",
            truncate(&report.display_name(key), 32),
            value(Metric::Commits),
            format!("+{}", value(Metric::Additions)),
            format!("-{}", value(Metric::Deletions)),
            value(Metric::Total),
        ));
    }

    Ok(out)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::test_report;

    #[test]
    fn test_text_lists_repositories_and_skips() {
        let out = render(&test_report()).expect("render text");
        assert!(out.contains("acme/widgets@main"));
        assert!(out.contains("complete"));
        assert!(out.contains("partial"));
        assert!(out.contains("failed"));
        assert!(out.contains("6dcb09b"));
        assert!(out.contains("still computing after 3 attempts"));
        assert!(out.contains("404"));
    }

    #[test]
    fn test_text_ranks_authors() {
        let out = render(&test_report()).expect("render text");
        let octocat = out.find("octocat (583231)").expect("octocat row");
        let dana = out.find("Dana").expect("Dana row");
        assert!(octocat < dana);
        assert!(out.contains("+125"));
    }

    #[test]
    fn test_text_empty_and_cancelled() {
        let mut report = test_report();
        report.authors = Default::default();
        report.cancelled = true;
        let mut not_started = report.repositories[0].clone();
        not_started.status = RepoStatus::Cancelled;
        not_started.commits_listed = 0;
        not_started.commits_aggregated = 0;
        report.repositories.push(not_started);
        let out = render(&report).expect("render text");
        assert!(out.contains("No commits aggregated"));
        assert!(out.contains("Run was cancelled"));
        assert!(out.contains("Not started (cancelled): 1"));
        assert!(out.contains("Failed: 1"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-login", 6), "a-ver…");
    }
}
