//! File reconstruction over the stored parent chain.
//!
//! Only a fraction of commits store full file content. To materialize a
//! file at an arbitrary commit, [`Reconstructor`] walks parent links from
//! that commit until it reaches a record that can produce content on its
//! own (a full post-image or a new file's patch), collecting the patches it
//! stepped over, then replays those patches oldest-first.
//!
//! # Walk rules
//!
//! For each visited record:
//!
//! | Record state for the file | Action |
//! |---------------------------|--------|
//! | full post-image stored | base case |
//! | `incremental_reference` with patch | patch pending, continue at the source commit |
//! | `patch_new` | base case: added lines of the patch |
//! | `patch_only` with patch and parent | patch pending, continue at the parent |
//! | anything else (incl. `deleted`) | absent |
//! | file not touched | continue at the parent; no parent → absent |
//!
//! Renames switch the lookup to the previous filename. A parent that was
//! never stored ends the walk with absent content.
//!
//! The walk is an explicit loop with a visited set, so a corrupted store
//! with a cyclic parent graph yields [`ChronicleError::CycleDetected`]
//! rather than looping, and [`ChronicleError::DepthExceeded`] caps very
//! long chains.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ChronicleError;
use crate::models::{CommitRecord, FileDiff, FileStatus, RepoName, StorageType};
use crate::patch::{added_lines, apply_patch};
use crate::store::CommitStore;

/// Default cap on the number of records a single walk may visit.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Content materialized for a file at a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedContent {
    pub content: String,
    /// False when a pending patch could not be applied and earlier content
    /// was substituted.
    pub exact: bool,
    /// Number of records loaded during the walk.
    pub commits_visited: usize,
    /// Commit whose stored data formed the base content.
    pub source_commit: String,
}

/// Before/after view of one file at one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileComparison {
    pub filename: String,
    pub commit_sha: String,
    pub parent_sha: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub status: ComparisonStatus,
    pub exact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Added,
    Removed,
    Modified,
    Unknown,
}

impl ComparisonStatus {
    pub fn from_sides(before: Option<&str>, after: Option<&str>) -> Self {
        match (before, after) {
            (None, Some(_)) => Self::Added,
            (Some(_), None) => Self::Removed,
            (Some(_), Some(_)) => Self::Modified,
            (None, None) => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Unknown => "unknown",
        }
    }
}

/// What one record contributes to the walk.
enum Step {
    Base(String),
    Continue {
        next: String,
        patch: Option<String>,
        filename: String,
    },
    Absent,
}

fn lookup_name(diff: &FileDiff) -> String {
    match (&diff.status, &diff.previous_filename) {
        (FileStatus::Renamed, Some(previous)) => previous.clone(),
        _ => diff.filename.clone(),
    }
}

fn step(record: &CommitRecord, filename: &str) -> Step {
    let Some(diff) = record.find_file(filename) else {
        return match &record.parent_sha {
            Some(parent) => Step::Continue {
                next: parent.clone(),
                patch: None,
                filename: filename.to_string(),
            },
            None => Step::Absent,
        };
    };

    if diff.storage == StorageType::Deleted || diff.status == FileStatus::Removed {
        return Step::Absent;
    }
    if let Some(after) = &diff.after {
        return Step::Base(after.clone());
    }

    match &diff.storage {
        StorageType::IncrementalReference { source } if !diff.patch.is_empty() => {
            Step::Continue {
                next: source.clone(),
                patch: Some(diff.patch.clone()),
                filename: lookup_name(diff),
            }
        }
        StorageType::PatchNew if !diff.patch.is_empty() => {
            Step::Base(added_lines(&diff.patch))
        }
        StorageType::PatchOnly if !diff.patch.is_empty() => match &record.parent_sha {
            Some(parent) => Step::Continue {
                next: parent.clone(),
                patch: Some(diff.patch.clone()),
                filename: lookup_name(diff),
            },
            None => Step::Absent,
        },
        _ => Step::Absent,
    }
}

/// Reconstructs file content from a [`CommitStore`].
pub struct Reconstructor<'a, S: CommitStore + ?Sized> {
    store: &'a S,
    max_depth: usize,
}

impl<'a, S: CommitStore + ?Sized> Reconstructor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Materialize `filename` as of `sha`.
    ///
    /// Returns `Ok(None)` when the file does not exist at that commit or
    /// its history runs past what was stored. Fails with
    /// [`ChronicleError::RecordNotFound`] only when `sha` itself was never
    /// ingested.
    pub async fn get_file_at_commit(
        &self,
        repo: &RepoName,
        sha: &str,
        filename: &str,
    ) -> Result<Option<ResolvedContent>, ChronicleError> {
        let mut visited: HashSet<String> = HashSet::new();
        // Newest first; replayed in reverse.
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut current = sha.to_string();
        let mut name = filename.to_string();

        loop {
            if visited.contains(&current) {
                return Err(ChronicleError::CycleDetected {
                    repo: repo.full_name(),
                    sha: current,
                });
            }
            if visited.len() >= self.max_depth {
                return Err(ChronicleError::DepthExceeded {
                    limit: self.max_depth,
                });
            }
            visited.insert(current.clone());

            let record = match self.store.get_record(repo, &current).await? {
                Some(record) => record,
                None if visited.len() == 1 => {
                    return Err(ChronicleError::RecordNotFound {
                        repo: repo.full_name(),
                        sha: current,
                    });
                }
                None => {
                    debug!(repo = %repo, commit = %current, "history horizon reached");
                    return Ok(None);
                }
            };

            match step(&record, &name) {
                Step::Base(content) => {
                    let (content, exact) = replay(content, &pending, &name);
                    return Ok(Some(ResolvedContent {
                        content,
                        exact,
                        commits_visited: visited.len(),
                        source_commit: current,
                    }));
                }
                Step::Continue {
                    next,
                    patch,
                    filename,
                } => {
                    if let Some(patch) = patch {
                        pending.push((current.clone(), patch));
                    }
                    current = next;
                    name = filename;
                }
                Step::Absent => return Ok(None),
            }
        }
    }

    /// Resolve `filename` at `sha` and at its parent.
    pub async fn get_file_comparison(
        &self,
        repo: &RepoName,
        sha: &str,
        filename: &str,
    ) -> Result<FileComparison, ChronicleError> {
        let record =
            self.store
                .get_record(repo, sha)
                .await?
                .ok_or_else(|| ChronicleError::RecordNotFound {
                    repo: repo.full_name(),
                    sha: sha.to_string(),
                })?;

        let after = self.get_file_at_commit(repo, sha, filename).await?;

        let before_name = record
            .find_file(filename)
            .map(lookup_name)
            .unwrap_or_else(|| filename.to_string());
        let before = match &record.parent_sha {
            Some(parent) => match self.get_file_at_commit(repo, parent, &before_name).await {
                Ok(resolved) => resolved,
                Err(ChronicleError::RecordNotFound { .. }) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let exact = after.as_ref().map_or(true, |r| r.exact)
            && before.as_ref().map_or(true, |r| r.exact);
        let before = before.map(|r| r.content);
        let after = after.map(|r| r.content);

        Ok(FileComparison {
            filename: filename.to_string(),
            commit_sha: sha.to_string(),
            parent_sha: record.parent_sha.clone(),
            status: ComparisonStatus::from_sides(before.as_deref(), after.as_deref()),
            before,
            after,
            exact,
        })
    }
}

/// Apply pending patches oldest-first. Stops at the first patch that does
/// not apply and keeps the content reached so far.
fn replay(base: String, pending: &[(String, String)], filename: &str) -> (String, bool) {
    let mut content = base;
    for (commit, patch) in pending.iter().rev() {
        match apply_patch(&content, patch) {
            Ok(next) => content = next,
            Err(e) => {
                warn!(
                    commit = %commit,
                    file = filename,
                    error = %e,
                    "patch did not apply, returning approximate content"
                );
                return (content, false);
            }
        }
    }
    (content, true)
}
