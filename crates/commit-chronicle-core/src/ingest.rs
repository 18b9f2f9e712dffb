//! Push ingestion pipeline.
//!
//! For each commit in a push, in listed order: analyze it against the host,
//! then write the resulting [`CommitRecord`](crate::models::CommitRecord)
//! to the store. Commits the host cannot supply are skipped and the batch
//! carries on. Redelivered commits keep their original ingestion timestamp,
//! so storing the same upstream commit twice leaves the store unchanged.

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::analyzer::CommitAnalyzer;
use crate::error::ChronicleError;
use crate::host::CommitHost;
use crate::models::{Author, RepoName};
use crate::push::PushEvent;
use crate::store::CommitStore;

/// What happened to a single commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First time this commit was stored.
    Stored,
    /// The commit was already stored and has been rewritten.
    Redelivered,
    /// The host could not supply the commit.
    Skipped(String),
}

/// Per-push counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub repository: String,
    /// False when the push named a repository that is not registered; no
    /// commits are processed in that case.
    pub registered: bool,
    pub received: usize,
    pub stored: usize,
    pub redelivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: &IngestOutcome) {
        match outcome {
            IngestOutcome::Stored => self.stored += 1,
            IngestOutcome::Redelivered => self.redelivered += 1,
            IngestOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Analyze and store one commit.
///
/// `author` overrides the host-reported author when the push supplied one.
/// Host misses and transport failures yield [`IngestOutcome::Skipped`];
/// only store errors are returned.
pub async fn ingest_commit<H, S>(
    host: &H,
    store: &S,
    repo: &RepoName,
    sha: &str,
    author: Option<&Author>,
) -> Result<IngestOutcome, ChronicleError>
where
    H: CommitHost + ?Sized,
    S: CommitStore + ?Sized,
{
    let analysis = match CommitAnalyzer::new(host).analyze_commit(repo, sha).await {
        Ok(analysis) => analysis,
        Err(e @ ChronicleError::CommitNotFound { .. })
        | Err(e @ ChronicleError::RemoteFetchFailure(_)) => {
            warn!(repo = %repo, commit = sha, error = %e, "skipping commit");
            return Ok(IngestOutcome::Skipped(e.to_string()));
        }
        Err(e) => return Err(e),
    };

    let existing = store.get_record(repo, sha).await?;
    let ingested_at = existing
        .as_ref()
        .map(|r| r.ingested_at)
        .unwrap_or_else(Utc::now);

    let mut record = analysis.into_record(ingested_at);
    if let Some(author) = author.filter(|a| **a != Author::default()) {
        record.author = author.clone();
    }
    store.put_record(repo, &record).await?;

    Ok(if existing.is_some() {
        IngestOutcome::Redelivered
    } else {
        IngestOutcome::Stored
    })
}

/// Ingest every commit of a push, sequentially and in listed order.
///
/// Pushes for repositories missing from the registry are acknowledged and
/// ignored. A store failure on one commit is logged and counted; the rest
/// of the push still runs.
pub async fn ingest_push<H, S>(
    host: &H,
    store: &S,
    event: &PushEvent,
) -> Result<IngestSummary, ChronicleError>
where
    H: CommitHost + ?Sized,
    S: CommitStore + ?Sized,
{
    let mut summary = IngestSummary {
        repository: event.repo.full_name(),
        received: event.commits.len(),
        ..IngestSummary::default()
    };

    if store.get_repository(&event.repo).await?.is_none() {
        info!(repo = %event.repo, "push for unregistered repository ignored");
        return Ok(summary);
    }
    summary.registered = true;

    for commit in &event.commits {
        match ingest_commit(host, store, &event.repo, &commit.id, Some(&commit.author)).await {
            Ok(outcome) => summary.record(&outcome),
            Err(e) => {
                error!(repo = %event.repo, commit = %commit.id, error = %e, "failed to store commit");
                summary.failed += 1;
            }
        }
    }

    info!(
        repo = %event.repo,
        received = summary.received,
        stored = summary.stored,
        redelivered = summary.redelivered,
        skipped = summary.skipped,
        failed = summary.failed,
        "push ingested"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, FileStatus, Repository, StorageType};
    use crate::store::memory::InMemoryStore;
    use crate::test_support::{changed, detail, FakeHost};
    use serde_json::json;

    async fn registered_store(repo: &RepoName) -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .add_repository(&Repository {
                repo: repo.clone(),
                repo_url: format!("https://github.com/{}", repo),
                webhook_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
    }

    fn push(commits: &[&str]) -> PushEvent {
        let commits: Vec<_> = commits
            .iter()
            .map(|id| json!({ "id": id, "message": format!("commit {}", id) }))
            .collect();
        PushEvent::from_value(json!({
            "ref": "refs/heads/main",
            "repository": { "full_name": "acme/widgets" },
            "commits": commits,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_dependency_and_readme_push() {
        let repo = RepoName::new("acme", "widgets");
        let requirements = "@@ -0,0 +1,2 @@\n+requests==2.3\n+flask==3";
        let readme = "@@ -0,0 +1 @@\n+# Widgets demos";
        assert_eq!((requirements.len(), readme.len()), (40, 30));

        let host = FakeHost::default().with_commit(detail(
            "c1",
            Some("c0"),
            "Add dependencies and a readme",
            vec![
                changed("requirements.txt", FileStatus::Added, requirements),
                changed("README.md", FileStatus::Added, readme),
            ],
        ));
        let store = registered_store(&repo).await;

        let summary = ingest_push(&host, &store, &push(&["c1"])).await.unwrap();
        assert!(summary.registered);
        assert_eq!(summary.stored, 1);

        let record = store.get_record(&repo, "c1").await.unwrap().unwrap();
        assert_eq!(record.event.event_type, EventType::DependencyUpdate);
        assert_eq!(record.parent_sha.as_deref(), Some("c0"));
        assert_eq!(record.files.len(), 2);
        for file in &record.files {
            assert_eq!(file.storage, StorageType::PatchNew, "{}", file.filename);
            assert!(file.before.is_none() && file.after.is_none());
        }
        assert_eq!(host.content_fetches(), 0);
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let repo = RepoName::new("acme", "widgets");
        let host = FakeHost::default().with_commit(detail(
            "c1",
            None,
            "fix crash",
            vec![changed("src/app.py", FileStatus::Modified, "@@ -1 +1 @@\n-a\n+b")],
        ));
        let store = registered_store(&repo).await;

        ingest_push(&host, &store, &push(&["c1"])).await.unwrap();
        let first = store.list_records(&repo).await.unwrap();

        let summary = ingest_push(&host, &store, &push(&["c1"])).await.unwrap();
        assert_eq!(summary.redelivered, 1);
        assert_eq!(summary.stored, 0);
        assert_eq!(store.list_records(&repo).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_missing_commits_skipped_batch_continues() {
        let repo = RepoName::new("acme", "widgets");
        let mut host = FakeHost::default()
            .with_commit(detail("c1", None, "init", vec![]))
            .with_commit(detail("c3", Some("c1"), "more", vec![]));
        host.broken.push("c4".to_string());
        let store = registered_store(&repo).await;

        let summary = ingest_push(&host, &store, &push(&["c1", "c2", "c3", "c4"]))
            .await
            .unwrap();
        assert_eq!(summary.received, 4);
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.skipped, 2);

        let shas: Vec<String> = store
            .list_records(&repo)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.commit_sha)
            .collect();
        assert_eq!(shas, vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn test_unregistered_repository_ignored() {
        let repo = RepoName::new("acme", "widgets");
        let host = FakeHost::default().with_commit(detail("c1", None, "init", vec![]));
        let store = InMemoryStore::new();

        let summary = ingest_push(&host, &store, &push(&["c1"])).await.unwrap();
        assert!(!summary.registered);
        assert_eq!(summary.stored, 0);
        assert!(store.get_record(&repo, "c1").await.unwrap().is_none());
        assert_eq!(host.detail_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_push_author_overrides_host() {
        let repo = RepoName::new("acme", "widgets");
        let host = FakeHost::default().with_commit(detail("c1", None, "init", vec![]));
        let store = registered_store(&repo).await;
        let author = Author {
            name: Some("Ada".to_string()),
            email: None,
            username: Some("ada".to_string()),
        };

        ingest_commit(&host, &store, &repo, "c1", Some(&author))
            .await
            .unwrap();
        let record = store.get_record(&repo, "c1").await.unwrap().unwrap();
        assert_eq!(record.author, author);
    }
}
