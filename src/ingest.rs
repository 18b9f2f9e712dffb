//! Manual commit ingestion.
//!
//! `chron ingest <owner/repo> <sha>...` runs the same pipeline as a webhook
//! delivery for commits that were pushed before the repository was
//! registered, or whose delivery was lost.

use anyhow::{bail, Result};

use commit_chronicle_core::ingest::{ingest_commit, IngestOutcome, IngestSummary};
use commit_chronicle_core::models::RepoName;
use commit_chronicle_core::store::CommitStore;

use crate::config::{self, Config};
use crate::github::GitHubClient;
use crate::sqlite_store;

pub async fn run_ingest(config: &Config, repo: &str, shas: &[String]) -> Result<()> {
    let Some(repo) = RepoName::parse(repo) else {
        bail!("expected <owner>/<repo>, got '{}'", repo);
    };
    if shas.is_empty() {
        bail!("no commits given");
    }

    let store = sqlite_store::open(config).await?;
    if store.get_repository(&repo).await?.is_none() {
        store.close().await;
        bail!("repository not registered: {} (run `chron repo add` first)", repo);
    }
    let host = GitHubClient::new(&config.github, config::github_token())?;

    let mut summary = IngestSummary {
        repository: repo.full_name(),
        registered: true,
        received: shas.len(),
        ..IngestSummary::default()
    };

    println!("ingest {}", repo);
    for sha in shas {
        match ingest_commit(&host, &store, &repo, sha, None).await {
            Ok(IngestOutcome::Stored) => {
                summary.stored += 1;
                println!("  {} stored", sha);
            }
            Ok(IngestOutcome::Redelivered) => {
                summary.redelivered += 1;
                println!("  {} updated", sha);
            }
            Ok(IngestOutcome::Skipped(reason)) => {
                summary.skipped += 1;
                println!("  {} skipped: {}", sha, reason);
            }
            Err(e) => {
                summary.failed += 1;
                println!("  {} failed: {}", sha, e);
            }
        }
    }
    store.close().await;

    println!(
        "  stored: {}, updated: {}, skipped: {}, failed: {}",
        summary.stored, summary.redelivered, summary.skipped, summary.failed
    );
    if summary.failed > 0 {
        bail!("{} commits could not be stored", summary.failed);
    }
    println!("ok");
    Ok(())
}
