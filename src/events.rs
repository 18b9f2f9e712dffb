//! Event feed and commit detail commands.

use anyhow::{bail, Result};

use commit_chronicle_core::models::{short_sha, EventSummary, RepoName};
use commit_chronicle_core::store::CommitStore;

use crate::config::Config;
use crate::sqlite_store;

pub(crate) fn parse_repo(raw: &str) -> Result<RepoName> {
    match RepoName::parse(raw) {
        Some(repo) => Ok(repo),
        None => bail!("expected <owner>/<repo>, got '{}'", raw),
    }
}

/// `chron events [owner/repo] [--limit N]`
///
/// Without a repository, lists the most recent events across all of them.
pub async fn run_events(config: &Config, repo: Option<&str>, limit: usize) -> Result<()> {
    let repo = repo.map(parse_repo).transpose()?;
    let store = sqlite_store::open(config).await?;
    let events = match &repo {
        Some(repo) => store.recent_events(repo, limit).await,
        None => store.all_recent_events(limit).await,
    };
    store.close().await;
    let events = events?;

    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }
    for event in &events {
        print_event(event, repo.is_none());
    }
    Ok(())
}

fn print_event(event: &EventSummary, with_repo: bool) {
    let prefix = if with_repo {
        format!("{} ", event.repository)
    } else {
        String::new()
    };
    println!(
        "{}{}  {}  {:<18} {} ({} files)",
        prefix,
        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
        short_sha(&event.commit_sha),
        event.event_type.as_str(),
        event.description,
        event.files_changed
    );
}

/// `chron show <owner/repo> <sha> [--json]`
pub async fn run_show(config: &Config, repo: &str, sha: &str, json: bool) -> Result<()> {
    let repo = parse_repo(repo)?;
    let store = sqlite_store::open(config).await?;
    let record = store.get_record(&repo, sha).await;
    store.close().await;

    let Some(record) = record? else {
        bail!("commit not found: {}@{}", repo, sha);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("commit {}", record.commit_sha);
    if let Some(parent) = &record.parent_sha {
        println!("parent {}", parent);
    }
    let author = record
        .author
        .username
        .as_deref()
        .or(record.author.name.as_deref())
        .unwrap_or("unknown");
    println!("author {}", author);
    println!("ingested {}", record.ingested_at.to_rfc3339());
    println!();
    for line in record.message.lines() {
        println!("    {}", line);
    }
    println!();
    println!(
        "{}: {} (+{} -{})",
        record.event.event_type.as_str(),
        record.event.description,
        record.event.total_additions,
        record.event.total_deletions
    );
    for file in &record.files {
        println!(
            "  {:<9} {:<22} +{:<5} -{:<5} {}",
            file.status.as_str(),
            file.storage.label(),
            file.additions,
            file.deletions,
            file.filename
        );
    }
    Ok(())
}
