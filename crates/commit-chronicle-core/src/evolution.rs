//! Evolution analysis over stored commit history.
//!
//! Classifies each file change by how much of the file survived it,
//! detects whether a repository was bulk-uploaded or developed gradually,
//! and assembles the per-repository [`EvolutionReport`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ChronicleError;
use crate::models::{short_sha, CommitRecord, EventType, FileDiff, FileStatus, RepoName};
use crate::similarity::{bounded_similarity, strip_whitespace};
use crate::store::CommitStore;

/// Similarities below this are only needed as "low"; computing them
/// exactly would cost quadratic time on unrelated files.
const SIMILARITY_FLOOR: f64 = 0.5;

/// Combined size (in bytes) of both sides above which similarity is not
/// computed and the change is classified from its patch instead.
pub const MAX_SIMILARITY_BYTES: usize = 16 * 1024;

const NEAR_IDENTICAL: f64 = 0.95;
const SAME_LOGIC: f64 = 0.95;
const REFACTOR_LOGIC: f64 = 0.80;
const SMALL_PATCH_BYTES: usize = 200;

/// Share of all changed files carried by the first commit above which the
/// history is considered a bulk upload.
const BULK_UPLOAD_RATIO: f64 = 0.7;
const GRADUAL_FILES_PER_COMMIT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    NewFile,
    DeletedFile,
    MinorChanges,
    FormattingOnly,
    Refactoring,
    MajorRewrite,
    SmallChange,
    Expansion,
    Reduction,
    Modification,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewFile => "new_file",
            Self::DeletedFile => "deleted_file",
            Self::MinorChanges => "minor_changes",
            Self::FormattingOnly => "formatting_only",
            Self::Refactoring => "refactoring",
            Self::MajorRewrite => "major_rewrite",
            Self::SmallChange => "small_change",
            Self::Expansion => "expansion",
            Self::Reduction => "reduction",
            Self::Modification => "modification",
        }
    }
}

/// Result of [`analyze_code_similarity`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeAnalysis {
    pub change_type: ChangeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic_similarity: Option<f64>,
    pub patch_size: usize,
    pub has_full_content: bool,
}

/// Classify one file change.
///
/// With both sides captured the decision uses character similarity and
/// whitespace-insensitive "logic" similarity; otherwise it falls back to
/// patch size and the addition/deletion balance. Sides that are empty, or
/// together larger than [`MAX_SIMILARITY_BYTES`], also take the fallback.
pub fn analyze_code_similarity(diff: &FileDiff) -> ChangeAnalysis {
    let patch_size = diff.patch.len();
    let patch_based = |change_type| ChangeAnalysis {
        change_type,
        similarity: None,
        logic_similarity: None,
        patch_size,
        has_full_content: false,
    };

    match diff.status {
        FileStatus::Added => {
            return ChangeAnalysis {
                has_full_content: diff.after.is_some(),
                ..patch_based(ChangeType::NewFile)
            };
        }
        FileStatus::Removed => return patch_based(ChangeType::DeletedFile),
        FileStatus::Modified | FileStatus::Renamed => {}
    }

    let comparable = match (diff.before.as_deref(), diff.after.as_deref()) {
        (Some(before), Some(after))
            if !before.is_empty()
                && !after.is_empty()
                && before.len() + after.len() <= MAX_SIMILARITY_BYTES =>
        {
            Some((before, after))
        }
        _ => None,
    };

    if let Some((before, after)) = comparable {
        let similarity = bounded_similarity(before, after, SIMILARITY_FLOOR);
        let logic = bounded_similarity(
            &strip_whitespace(before),
            &strip_whitespace(after),
            SIMILARITY_FLOOR,
        );
        let change_type = if similarity > NEAR_IDENTICAL {
            ChangeType::MinorChanges
        } else if logic > SAME_LOGIC && similarity < NEAR_IDENTICAL {
            ChangeType::FormattingOnly
        } else if logic > REFACTOR_LOGIC {
            ChangeType::Refactoring
        } else {
            ChangeType::MajorRewrite
        };
        return ChangeAnalysis {
            change_type,
            similarity: Some(similarity),
            logic_similarity: Some(logic),
            patch_size,
            has_full_content: true,
        };
    }

    let change_type = if patch_size < SMALL_PATCH_BYTES {
        ChangeType::SmallChange
    } else if diff.additions > diff.deletions * 2 {
        ChangeType::Expansion
    } else if diff.deletions > diff.additions * 2 {
        ChangeType::Reduction
    } else {
        ChangeType::Modification
    };
    patch_based(change_type)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    BulkUpload,
    GradualDevelopment,
    MixedDevelopment,
    NoCommits,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulkUpload => "bulk_upload",
            Self::GradualDevelopment => "gradual_development",
            Self::MixedDevelopment => "mixed_development",
            Self::NoCommits => "no_commits",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DevelopmentPattern {
    pub pattern: PatternKind,
    pub total_commits: usize,
    /// First commit's files over all files changed, in `[0, 1]`.
    pub first_commit_ratio: f64,
    pub avg_files_per_commit: f64,
}

/// Decide how a repository's history was built up. `records` must be in
/// chronological order.
pub fn detect_development_pattern(records: &[CommitRecord]) -> DevelopmentPattern {
    let Some(first) = records.first() else {
        return DevelopmentPattern {
            pattern: PatternKind::NoCommits,
            total_commits: 0,
            first_commit_ratio: 0.0,
            avg_files_per_commit: 0.0,
        };
    };

    let total_files: usize = records.iter().map(|r| r.event.files_changed).sum();
    let avg_files_per_commit = total_files as f64 / records.len() as f64;
    let first_commit_ratio = if total_files > 0 {
        first.event.files_changed as f64 / total_files as f64
    } else {
        0.0
    };

    let pattern = if first_commit_ratio > BULK_UPLOAD_RATIO {
        PatternKind::BulkUpload
    } else if avg_files_per_commit < GRADUAL_FILES_PER_COMMIT {
        PatternKind::GradualDevelopment
    } else {
        PatternKind::MixedDevelopment
    };

    DevelopmentPattern {
        pattern,
        total_commits: records.len(),
        first_commit_ratio,
        avg_files_per_commit,
    }
}

/// One change to one file, as it appears in a file's evolution timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionEntry {
    pub commit_sha: String,
    pub parent_sha: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub status: FileStatus,
    pub change_type: ChangeType,
    pub additions: u64,
    pub deletions: u64,
    pub lines_before: usize,
    pub lines_after: usize,
    pub has_full_content: bool,
}

impl EvolutionEntry {
    fn new(record: &CommitRecord, diff: &FileDiff) -> Self {
        let analysis = analyze_code_similarity(diff);
        let line_count = |side: &Option<String>| side.as_deref().map_or(0, |s| s.lines().count());
        Self {
            commit_sha: record.commit_sha.clone(),
            parent_sha: record.parent_sha.clone(),
            timestamp: record.ingested_at,
            message: record.message.clone(),
            status: diff.status,
            change_type: analysis.change_type,
            additions: diff.additions,
            deletions: diff.deletions,
            lines_before: line_count(&diff.before),
            lines_after: line_count(&diff.after),
            has_full_content: analysis.has_full_content,
        }
    }
}

/// Chronological evolution of a single file across `records`.
pub fn analyze_file_evolution(filename: &str, records: &[CommitRecord]) -> Vec<EvolutionEntry> {
    records
        .iter()
        .flat_map(|record| {
            record
                .files
                .iter()
                .filter(move |diff| diff.filename == filename)
                .map(move |diff| EvolutionEntry::new(record, diff))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageEfficiency {
    pub total_file_changes: usize,
    pub full_content_stored: usize,
    pub patch_only: usize,
    pub patch_only_percentage: f64,
}

impl StorageEfficiency {
    fn from_records(records: &[CommitRecord]) -> Self {
        let diffs = records.iter().flat_map(|r| r.files.iter());
        let (total, full) = diffs.fold((0usize, 0usize), |(total, full), diff| {
            (total + 1, full + usize::from(diff.has_full_content()))
        });
        let patch_only = total - full;
        let patch_only_percentage = if total > 0 {
            patch_only as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total_file_changes: total,
            full_content_stored: full,
            patch_only,
            patch_only_percentage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub sha: String,
    pub parent_sha: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionReport {
    pub repository: String,
    pub total_commits: usize,
    pub development_pattern: DevelopmentPattern,
    pub event_distribution: BTreeMap<String, usize>,
    pub total_files_touched: usize,
    pub storage_efficiency: StorageEfficiency,
    pub file_evolutions: BTreeMap<String, Vec<EvolutionEntry>>,
    pub timeline: Vec<TimelineEntry>,
}

/// Build a report from chronologically ordered records.
pub fn build_report(repo: &RepoName, records: &[CommitRecord]) -> EvolutionReport {
    let mut event_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut file_evolutions: BTreeMap<String, Vec<EvolutionEntry>> = BTreeMap::new();

    for record in records {
        *event_distribution
            .entry(record.event.event_type.as_str().to_string())
            .or_default() += 1;
        for diff in &record.files {
            file_evolutions
                .entry(diff.filename.clone())
                .or_default()
                .push(EvolutionEntry::new(record, diff));
        }
    }

    let timeline = records
        .iter()
        .map(|r| TimelineEntry {
            sha: short_sha(&r.commit_sha).to_string(),
            parent_sha: r.parent_sha.as_deref().map(|p| short_sha(p).to_string()),
            timestamp: r.ingested_at,
            event_type: r.event.event_type,
            description: r.event.description.clone(),
        })
        .collect();

    EvolutionReport {
        repository: repo.full_name(),
        total_commits: records.len(),
        development_pattern: detect_development_pattern(records),
        event_distribution,
        total_files_touched: file_evolutions.len(),
        storage_efficiency: StorageEfficiency::from_records(records),
        file_evolutions,
        timeline,
    }
}

/// Load a repository's history from `store` and report on it. Returns
/// `None` when nothing has been stored for the repository.
pub async fn generate_report<S: CommitStore + ?Sized>(
    store: &S,
    repo: &RepoName,
) -> Result<Option<EvolutionReport>, ChronicleError> {
    let records = store.list_records(repo).await?;
    if records.is_empty() {
        return Ok(None);
    }
    Ok(Some(build_report(repo, &records)))
}
