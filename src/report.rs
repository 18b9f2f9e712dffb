//! `chron report`: repository evolution summary.

use anyhow::{bail, Result};

use commit_chronicle_core::evolution::generate_report;
use commit_chronicle_core::models::short_sha;

use crate::config::Config;
use crate::events::parse_repo;
use crate::sqlite_store;

pub async fn run_report(config: &Config, repo: &str, json: bool) -> Result<()> {
    let repo = parse_repo(repo)?;
    let store = sqlite_store::open(config).await?;
    let report = generate_report(&store, &repo).await;
    store.close().await;

    let Some(report) = report? else {
        bail!("no commits found for {}", repo);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let pattern = &report.development_pattern;
    let storage = &report.storage_efficiency;

    println!("Evolution report: {}", report.repository);
    println!("================================");
    println!();
    println!("  Commits:        {}", report.total_commits);
    println!("  Files touched:  {}", report.total_files_touched);
    println!(
        "  Pattern:        {} (first commit {:.0}% of files, {:.1} files/commit)",
        pattern.pattern.as_str(),
        pattern.first_commit_ratio * 100.0,
        pattern.avg_files_per_commit
    );
    println!(
        "  Storage:        {} full, {} patch-only of {} ({:.1}% patch-only)",
        storage.full_content_stored,
        storage.patch_only,
        storage.total_file_changes,
        storage.patch_only_percentage
    );
    println!();
    println!("  Events:");
    for (event_type, count) in &report.event_distribution {
        println!("    {:<20} {}", event_type, count);
    }
    println!();
    println!("  Timeline:");
    for entry in &report.timeline {
        println!(
            "    {}  {}  {:<18} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            short_sha(&entry.sha),
            entry.event_type.as_str(),
            entry.description
        );
    }
    Ok(())
}
