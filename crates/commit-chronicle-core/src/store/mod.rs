//! Storage abstraction for Commit Chronicle.
//!
//! The [`CommitStore`] trait defines every storage operation needed by the
//! ingestion pipeline, the reconstruction engine, and the read API,
//! enabling pluggable backends (SQLite, in-memory).
//!
//! Records are keyed by (repository, commit id). Writes to distinct keys
//! never interfere; a second write to the same key replaces the payload but
//! keeps the record's original position in chronological order.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CommitRecord, EventSummary, RepoName, Repository};

/// Abstract storage backend for commit records and the repository registry.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`put_record`](CommitStore::put_record) | Insert or replace a commit record |
/// | [`get_record`](CommitStore::get_record) | Fetch one record by commit id |
/// | [`list_records`](CommitStore::list_records) | All records of a repository, oldest first |
/// | [`recent_events`](CommitStore::recent_events) | Newest event summaries of a repository |
/// | [`all_recent_events`](CommitStore::all_recent_events) | Newest event summaries across repositories |
/// | [`add_repository`](CommitStore::add_repository) | Register a repository |
/// | [`get_repository`](CommitStore::get_repository) | Look up a registered repository |
/// | [`list_repositories`](CommitStore::list_repositories) | All registered repositories |
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Insert a record, or replace the payload stored under the same
    /// (repository, commit id).
    async fn put_record(&self, repo: &RepoName, record: &CommitRecord) -> Result<()>;

    async fn get_record(&self, repo: &RepoName, sha: &str) -> Result<Option<CommitRecord>>;

    /// All records of a repository ordered by `ingested_at`, ties broken by
    /// first-write order.
    async fn list_records(&self, repo: &RepoName) -> Result<Vec<CommitRecord>>;

    /// Up to `limit` event summaries of a repository, newest first.
    async fn recent_events(&self, repo: &RepoName, limit: usize) -> Result<Vec<EventSummary>>;

    /// Up to `limit` event summaries across all repositories, newest first.
    async fn all_recent_events(&self, limit: usize) -> Result<Vec<EventSummary>>;

    /// Register a repository. Returns `false` when it was already present.
    async fn add_repository(&self, repository: &Repository) -> Result<bool>;

    async fn get_repository(&self, repo: &RepoName) -> Result<Option<Repository>>;

    async fn list_repositories(&self) -> Result<Vec<Repository>>;
}
