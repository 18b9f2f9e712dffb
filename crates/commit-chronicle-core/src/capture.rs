//! Diff capture policy.
//!
//! Decides, per changed file, whether the full pre/post content is worth
//! fetching from the host, and which reconstruction strategy the stored
//! [`FileDiff`](crate::models::FileDiff) will rely on afterwards.
//!
//! Small patches are considered sufficient on their own: an added file's
//! patch lists every line, and a small modification can be replayed over
//! the parent's content. Only patches larger than
//! [`FULL_CONTENT_THRESHOLD`] bytes trigger content fetches.

use crate::models::{FileStatus, StorageType};

/// Patch size in bytes above which full content is fetched.
pub const FULL_CONTENT_THRESHOLD: usize = 800;

/// Returns true when a file with this status and patch length should have
/// its full content captured. Removed files never do.
pub fn needs_full_content(status: FileStatus, patch_len: usize) -> bool {
    status != FileStatus::Removed && patch_len > FULL_CONTENT_THRESHOLD
}

/// Which sides of a change to fetch from the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapturePlan {
    pub fetch_before: bool,
    pub fetch_after: bool,
}

impl CapturePlan {
    pub fn fetches(&self) -> usize {
        usize::from(self.fetch_before) + usize::from(self.fetch_after)
    }
}

/// Build the fetch plan for one file.
///
/// | Status | Pre-image | Post-image |
/// |--------|-----------|------------|
/// | added | never | when large |
/// | removed | never | never |
/// | modified | when large and a parent exists | when large |
/// | renamed | never | when large |
pub fn plan_capture(status: FileStatus, patch_len: usize, has_parent: bool) -> CapturePlan {
    if !needs_full_content(status, patch_len) {
        return CapturePlan::default();
    }
    match status {
        FileStatus::Added | FileStatus::Renamed => CapturePlan {
            fetch_before: false,
            fetch_after: true,
        },
        FileStatus::Modified => CapturePlan {
            fetch_before: has_parent,
            fetch_after: true,
        },
        FileStatus::Removed => CapturePlan::default(),
    }
}

/// Choose the storage tag once capture has finished.
///
/// `after_captured` reports whether the post-image was actually obtained;
/// a planned fetch that failed falls back to an incremental reference on
/// the parent so the patch can still be replayed.
pub fn storage_for(
    status: FileStatus,
    plan: CapturePlan,
    after_captured: bool,
    parent_sha: Option<&str>,
) -> StorageType {
    match status {
        FileStatus::Removed => StorageType::Deleted,
        _ if after_captured => StorageType::FullContent,
        FileStatus::Added => StorageType::PatchNew,
        FileStatus::Modified | FileStatus::Renamed => match parent_sha {
            Some(parent) if plan.fetch_after => StorageType::IncrementalReference {
                source: parent.to_string(),
            },
            _ => StorageType::PatchOnly,
        },
    }
}
