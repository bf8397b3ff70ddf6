//! Init command - write an example configuration file

use anyhow::{Context, Result};
use commit_tally::config::EXAMPLE_CONFIG;
use console::style;
use std::path::Path;

/// Run the init command
pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Created {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    println!(
        "\nEdit the repository list, export {} for higher rate limits, then run:\n  {}",
        style("GITHUB_TOKEN").bold(),
        style(format!("commit-tally --config {}", path.display())).cyan()
    );
    Ok(())
}
