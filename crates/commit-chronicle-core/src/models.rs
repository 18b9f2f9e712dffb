//! Core data models used throughout Commit Chronicle.
//!
//! These types represent the commit records, file diffs, and classified
//! events that flow through the ingestion, reconstruction, and evolution
//! pipelines. Every type serializes to the JSON shape persisted by the
//! store and returned by the read API.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository identifier in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoName {
    pub owner: String,
    pub name: String,
}

impl RepoName {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses a `owner/name` full name. Both halves must be non-empty and
    /// there must be exactly one separator.
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.trim().split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    /// Extracts the repository from a clone or browser URL such as
    /// `https://github.com/acme/widgets` or `https://github.com/acme/widgets.git`.
    pub fn from_url(url: &str) -> Option<Self> {
        let mut parts = url.trim().trim_end_matches('/').rsplit('/');
        let name = parts.next()?.trim_end_matches(".git");
        let owner = parts.next()?;
        if owner.is_empty() || name.is_empty() || owner.contains(':') {
            return None;
        }
        Some(Self::new(owner, name))
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Change status of a file within a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Removed,
    Modified,
    Renamed,
}

impl FileStatus {
    /// Maps a host status string onto the four tracked statuses.
    ///
    /// GitHub also reports `copied`, `changed` (mode only), and `unchanged`;
    /// all of those carry a post-image and are treated as modifications.
    pub fn from_host(status: &str) -> Self {
        match status {
            "added" => Self::Added,
            "removed" => Self::Removed,
            "renamed" => Self::Renamed,
            _ => Self::Modified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Renamed => "renamed",
        }
    }
}

/// How the post-commit content of a file can be recovered.
///
/// Exactly one strategy applies to a stored [`FileDiff`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageType {
    /// The full post-image is stored in [`FileDiff::after`].
    FullContent,
    /// Only the patch is stored; content is the parent's content plus the patch.
    PatchOnly,
    /// The patch is a pure-addition listing of a new file.
    PatchNew,
    /// Content is the referenced commit's content plus the patch.
    IncrementalReference { source: String },
    /// The file no longer exists after this commit.
    Deleted,
}

impl StorageType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FullContent => "full_content",
            Self::PatchOnly => "patch_only",
            Self::PatchNew => "patch_new",
            Self::IncrementalReference { .. } => "incremental_reference",
            Self::Deleted => "deleted",
        }
    }
}

/// One changed file within a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_filename: Option<String>,
    pub status: FileStatus,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
    #[serde(default)]
    pub patch: String,
    /// Pre-image content. Never present for added files.
    #[serde(default)]
    pub before: Option<String>,
    /// Post-image content. Never present for removed files.
    #[serde(default)]
    pub after: Option<String>,
    pub storage: StorageType,
}

impl FileDiff {
    /// True when either side of the change was captured in full.
    pub fn has_full_content(&self) -> bool {
        self.before.is_some() || self.after.is_some()
    }
}

/// Author descriptor as reported by the push notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// The fixed set of commit classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DependencyUpdate,
    NewModule,
    ConfigChange,
    Documentation,
    Testing,
    Refactor,
    MajorFeature,
    FilesAdded,
    Cleanup,
    BugFix,
    Feature,
    MinorUpdate,
    MajorUpdate,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DependencyUpdate => "dependency_update",
            Self::NewModule => "new_module",
            Self::ConfigChange => "config_change",
            Self::Documentation => "documentation",
            Self::Testing => "testing",
            Self::Refactor => "refactor",
            Self::MajorFeature => "major_feature",
            Self::FilesAdded => "files_added",
            Self::Cleanup => "cleanup",
            Self::BugFix => "bug_fix",
            Self::Feature => "feature",
            Self::MinorUpdate => "minor_update",
            Self::MajorUpdate => "major_update",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result embedded in a [`CommitRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub description: String,
    pub files_changed: usize,
    pub total_additions: u64,
    pub total_deletions: u64,
}

/// Persisted record of one ingested commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_sha: String,
    pub parent_sha: Option<String>,
    pub ingested_at: DateTime<Utc>,
    #[serde(default)]
    pub committed_at: Option<DateTime<Utc>>,
    pub message: String,
    #[serde(default)]
    pub author: Author,
    pub event: Event,
    pub files: Vec<FileDiff>,
}

impl CommitRecord {
    /// Returns the diff for `filename` if this commit touched it.
    pub fn find_file(&self, filename: &str) -> Option<&FileDiff> {
        self.files.iter().find(|f| f.filename == filename)
    }
}

/// Abbreviates a commit id to seven characters.
pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Lightweight projection of a [`CommitRecord`] for event feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub repository: String,
    pub commit_sha: String,
    pub parent_sha: Option<String>,
    pub event_type: EventType,
    pub description: String,
    pub files_changed: usize,
    pub timestamp: DateTime<Utc>,
}

impl EventSummary {
    pub fn from_record(repo: &RepoName, record: &CommitRecord) -> Self {
        Self {
            repository: repo.full_name(),
            commit_sha: record.commit_sha.clone(),
            parent_sha: record.parent_sha.clone(),
            event_type: record.event.event_type,
            description: record.event.description.clone(),
            files_changed: record.event.files_changed,
            timestamp: record.ingested_at,
        }
    }
}

/// A repository registered for webhook ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(flatten)]
    pub repo: RepoName,
    pub repo_url: String,
    pub webhook_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
