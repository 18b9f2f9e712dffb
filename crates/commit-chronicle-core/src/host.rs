//! Remote version-control host abstraction.
//!
//! The [`CommitHost`] trait is the only way the engine talks to the outside
//! world. The production implementation is the GitHub REST client in the
//! `commit-chronicle` crate; tests use in-process fakes.
//!
//! Content fetches never fail the caller. They return a [`ContentFetch`]
//! that records whether content was obtained, so downstream logic that
//! already tolerates absent content needs no separate error channel.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ChronicleError;
use crate::models::{Author, FileStatus, RepoName};

/// Aggregate line statistics reported by the host for a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
}

/// One entry of a commit's change list as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub filename: String,
    pub previous_filename: Option<String>,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    /// Unified-diff hunks. Empty for binary files or very large diffs.
    pub patch: String,
}

/// Commit detail as returned by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitDetail {
    pub sha: String,
    pub message: String,
    pub author: Author,
    pub committed_at: Option<DateTime<Utc>>,
    /// Parent commit ids in host order. Only the first is tracked.
    pub parent_shas: Vec<String>,
    pub files: Vec<ChangedFile>,
    pub stats: CommitStats,
}

/// Outcome of a best-effort file content fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentFetch {
    Present(String),
    /// The host has no such file at that ref.
    Missing,
    /// Transport, timeout, or decoding failure.
    Failed(String),
}

impl ContentFetch {
    pub fn into_content(self) -> Option<String> {
        match self {
            Self::Present(content) => Some(content),
            Self::Missing | Self::Failed(_) => None,
        }
    }
}

/// Remote host operations consumed by the commit analyzer.
#[async_trait]
pub trait CommitHost: Send + Sync {
    /// Fetch commit metadata, parents, and per-file patches.
    ///
    /// Returns [`ChronicleError::CommitNotFound`] when the host has no such
    /// commit and [`ChronicleError::RemoteFetchFailure`] on any other
    /// non-success response or transport error.
    async fn get_commit_detail(
        &self,
        repo: &RepoName,
        sha: &str,
    ) -> Result<CommitDetail, ChronicleError>;

    /// Fetch the content of `path` at `git_ref`.
    async fn get_file_content(&self, repo: &RepoName, path: &str, git_ref: &str) -> ContentFetch;

    /// Register a push webhook pointing at `callback_url`, returning the
    /// host-assigned hook id.
    async fn register_webhook(
        &self,
        repo: &RepoName,
        callback_url: &str,
        secret: Option<&str>,
    ) -> Result<i64, ChronicleError>;
}
