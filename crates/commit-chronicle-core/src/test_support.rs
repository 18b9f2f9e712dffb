//! Scripted [`CommitHost`] used by the analyzer and ingestion tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ChronicleError;
use crate::host::{ChangedFile, CommitDetail, CommitHost, CommitStats, ContentFetch};
use crate::models::{FileStatus, RepoName};

#[derive(Default)]
pub struct FakeHost {
    pub commits: HashMap<String, CommitDetail>,
    /// Keyed by (path, ref).
    pub contents: HashMap<(String, String), ContentFetch>,
    /// Commit ids whose detail fetch fails with a transport error.
    pub broken: Vec<String>,
    pub detail_calls: AtomicUsize,
    pub content_calls: AtomicUsize,
    pub hooks: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn with_commit(mut self, detail: CommitDetail) -> Self {
        self.commits.insert(detail.sha.clone(), detail);
        self
    }

    pub fn with_content(mut self, path: &str, git_ref: &str, fetch: ContentFetch) -> Self {
        self.contents
            .insert((path.to_string(), git_ref.to_string()), fetch);
        self
    }

    pub fn content_fetches(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommitHost for FakeHost {
    async fn get_commit_detail(
        &self,
        repo: &RepoName,
        sha: &str,
    ) -> Result<CommitDetail, ChronicleError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.iter().any(|b| b == sha) {
            return Err(ChronicleError::RemoteFetchFailure(format!(
                "connection reset fetching {}",
                sha
            )));
        }
        self.commits
            .get(sha)
            .cloned()
            .ok_or_else(|| ChronicleError::CommitNotFound {
                repo: repo.full_name(),
                sha: sha.to_string(),
            })
    }

    async fn get_file_content(&self, _repo: &RepoName, path: &str, git_ref: &str) -> ContentFetch {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.contents
            .get(&(path.to_string(), git_ref.to_string()))
            .cloned()
            .unwrap_or(ContentFetch::Missing)
    }

    async fn register_webhook(
        &self,
        _repo: &RepoName,
        callback_url: &str,
        _secret: Option<&str>,
    ) -> Result<i64, ChronicleError> {
        let mut hooks = self
            .hooks
            .lock()
            .map_err(|_| ChronicleError::RemoteFetchFailure("poisoned".to_string()))?;
        hooks.push(callback_url.to_string());
        Ok(hooks.len() as i64)
    }
}

pub fn changed(filename: &str, status: FileStatus, patch: &str) -> ChangedFile {
    let additions = patch.lines().filter(|l| l.starts_with('+')).count() as u64;
    let deletions = patch.lines().filter(|l| l.starts_with('-')).count() as u64;
    ChangedFile {
        filename: filename.to_string(),
        previous_filename: None,
        status,
        additions,
        deletions,
        changes: additions + deletions,
        patch: patch.to_string(),
    }
}

pub fn detail(sha: &str, parent: Option<&str>, message: &str, files: Vec<ChangedFile>) -> CommitDetail {
    let stats = CommitStats {
        additions: files.iter().map(|f| f.additions).sum(),
        deletions: files.iter().map(|f| f.deletions).sum(),
    };
    CommitDetail {
        sha: sha.to_string(),
        message: message.to_string(),
        parent_shas: parent.into_iter().map(String::from).collect(),
        files,
        stats,
        ..CommitDetail::default()
    }
}
