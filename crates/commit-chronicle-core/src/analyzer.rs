//! Commit analysis: host commit detail → classified event + captured diffs.
//!
//! [`CommitAnalyzer::analyze_commit`] fetches one commit from the host,
//! applies the capture policy to every changed file independently, and runs
//! the classifier over the aggregate. Content fetch failures degrade the
//! affected file to patch-based storage and never abort the commit.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::capture::{plan_capture, storage_for};
use crate::classify::classify;
use crate::error::ChronicleError;
use crate::host::{ChangedFile, CommitHost, ContentFetch};
use crate::models::{Author, CommitRecord, Event, FileDiff, RepoName};

/// Everything learned about one commit, ready to become a [`CommitRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAnalysis {
    pub sha: String,
    pub event: Event,
    pub files: Vec<FileDiff>,
    pub parent_sha: Option<String>,
    pub message: String,
    pub author: Author,
    pub committed_at: Option<DateTime<Utc>>,
}

impl CommitAnalysis {
    pub fn into_record(self, ingested_at: DateTime<Utc>) -> CommitRecord {
        CommitRecord {
            commit_sha: self.sha,
            parent_sha: self.parent_sha,
            ingested_at,
            committed_at: self.committed_at,
            message: self.message,
            author: self.author,
            event: self.event,
            files: self.files,
        }
    }
}

pub struct CommitAnalyzer<'a, H: CommitHost + ?Sized> {
    host: &'a H,
}

impl<'a, H: CommitHost + ?Sized> CommitAnalyzer<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Analyze `sha` in `repo`.
    ///
    /// Propagates [`ChronicleError::CommitNotFound`] and
    /// [`ChronicleError::RemoteFetchFailure`] from the commit detail fetch;
    /// nothing after that point can fail.
    pub async fn analyze_commit(
        &self,
        repo: &RepoName,
        sha: &str,
    ) -> Result<CommitAnalysis, ChronicleError> {
        let detail = self.host.get_commit_detail(repo, sha).await?;
        let parent_sha = detail.parent_shas.first().cloned();

        let mut files = Vec::with_capacity(detail.files.len());
        for changed in detail.files {
            files.push(
                self.capture_file(repo, sha, parent_sha.as_deref(), changed)
                    .await,
            );
        }

        let event = classify(&files, detail.stats, &detail.message);
        debug!(
            repo = %repo,
            commit = sha,
            event = %event.event_type,
            files = files.len(),
            "commit analyzed"
        );

        Ok(CommitAnalysis {
            sha: sha.to_string(),
            event,
            files,
            parent_sha,
            message: detail.message,
            author: detail.author,
            committed_at: detail.committed_at,
        })
    }

    async fn capture_file(
        &self,
        repo: &RepoName,
        sha: &str,
        parent_sha: Option<&str>,
        changed: ChangedFile,
    ) -> FileDiff {
        let plan = plan_capture(changed.status, changed.patch.len(), parent_sha.is_some());

        let before = match parent_sha {
            Some(parent) if plan.fetch_before => {
                let path = changed
                    .previous_filename
                    .as_deref()
                    .unwrap_or(&changed.filename);
                self.fetch(repo, path, parent).await
            }
            _ => None,
        };
        let after = if plan.fetch_after {
            self.fetch(repo, &changed.filename, sha).await
        } else {
            None
        };

        let storage = storage_for(changed.status, plan, after.is_some(), parent_sha);
        FileDiff {
            filename: changed.filename,
            previous_filename: changed.previous_filename,
            status: changed.status,
            additions: changed.additions,
            deletions: changed.deletions,
            changes: changed.changes,
            patch: changed.patch,
            before,
            after,
            storage,
        }
    }

    async fn fetch(&self, repo: &RepoName, path: &str, git_ref: &str) -> Option<String> {
        match self.host.get_file_content(repo, path, git_ref).await {
            ContentFetch::Present(content) => Some(content),
            ContentFetch::Missing => {
                debug!(repo = %repo, path, git_ref, "file not present at ref");
                None
            }
            ContentFetch::Failed(reason) => {
                warn!(repo = %repo, path, git_ref, %reason, "content fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, FileStatus, StorageType};
    use crate::test_support::{changed, detail, FakeHost};

    fn big_patch() -> String {
        let mut patch = String::from("@@ -1,40 +1,40 @@\n");
        for i in 0..40 {
            patch.push_str(&format!("-old line number {:02}\n", i));
            patch.push_str(&format!("+new line number {:02}\n", i));
        }
        patch
    }

    #[tokio::test]
    async fn test_small_patches_fetch_nothing() {
        let host = FakeHost::default().with_commit(detail(
            "c2",
            Some("c1"),
            "Update deps",
            vec![
                changed("requirements.txt", FileStatus::Modified, "@@ -1 +1 @@\n-a==1\n+a==2"),
                changed("README.md", FileStatus::Modified, "@@ -1 +1 @@\n-x\n+y"),
            ],
        ));
        let repo = RepoName::new("acme", "widgets");
        let analysis = CommitAnalyzer::new(&host)
            .analyze_commit(&repo, "c2")
            .await
            .unwrap();

        assert_eq!(analysis.event.event_type, EventType::DependencyUpdate);
        assert_eq!(analysis.parent_sha.as_deref(), Some("c1"));
        assert_eq!(host.content_fetches(), 0);
        assert!(analysis.files.iter().all(|f| !f.has_full_content()));
        assert!(analysis
            .files
            .iter()
            .all(|f| f.storage == StorageType::PatchOnly));
    }

    #[tokio::test]
    async fn test_large_modification_fetches_both_sides() {
        let patch = big_patch();
        assert!(patch.len() > 800);
        let host = FakeHost::default()
            .with_commit(detail(
                "c2",
                Some("c1"),
                "Rewrite",
                vec![changed("src/lib.rs", FileStatus::Modified, &patch)],
            ))
            .with_content("src/lib.rs", "c1", ContentFetch::Present("old".into()))
            .with_content("src/lib.rs", "c2", ContentFetch::Present("new".into()));
        let repo = RepoName::new("acme", "widgets");
        let analysis = CommitAnalyzer::new(&host)
            .analyze_commit(&repo, "c2")
            .await
            .unwrap();

        let file = &analysis.files[0];
        assert_eq!(file.before.as_deref(), Some("old"));
        assert_eq!(file.after.as_deref(), Some("new"));
        assert_eq!(file.storage, StorageType::FullContent);
        assert_eq!(host.content_fetches(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_degrades_to_reference() {
        let patch = big_patch();
        let host = FakeHost::default()
            .with_commit(detail(
                "c2",
                Some("c1"),
                "Rewrite",
                vec![
                    changed("src/lib.rs", FileStatus::Modified, &patch),
                    changed("src/new.rs", FileStatus::Added, &patch),
                ],
            ))
            .with_content("src/lib.rs", "c2", ContentFetch::Failed("timeout".into()))
            .with_content("src/new.rs", "c2", ContentFetch::Present("fresh".into()));
        let repo = RepoName::new("acme", "widgets");
        let analysis = CommitAnalyzer::new(&host)
            .analyze_commit(&repo, "c2")
            .await
            .unwrap();

        let lib = analysis.files[0].clone();
        assert_eq!(lib.before, None);
        assert_eq!(lib.after, None);
        assert_eq!(
            lib.storage,
            StorageType::IncrementalReference {
                source: "c1".to_string()
            }
        );
        let added = &analysis.files[1];
        assert_eq!(added.before, None);
        assert_eq!(added.after.as_deref(), Some("fresh"));
        assert_eq!(added.storage, StorageType::FullContent);
    }

    #[tokio::test]
    async fn test_root_commit_and_removed_file() {
        let host = FakeHost::default().with_commit(detail(
            "c1",
            None,
            "Drop legacy",
            vec![changed("legacy.py", FileStatus::Removed, &big_patch())],
        ));
        let repo = RepoName::new("acme", "widgets");
        let analysis = CommitAnalyzer::new(&host)
            .analyze_commit(&repo, "c1")
            .await
            .unwrap();

        assert_eq!(analysis.parent_sha, None);
        assert_eq!(analysis.files[0].storage, StorageType::Deleted);
        assert_eq!(host.content_fetches(), 0);
    }

    #[tokio::test]
    async fn test_missing_commit() {
        let host = FakeHost::default();
        let repo = RepoName::new("acme", "widgets");
        let err = CommitAnalyzer::new(&host)
            .analyze_commit(&repo, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ChronicleError::CommitNotFound { .. }));
    }
}
