//! Error taxonomy for the ingestion and reconstruction engine.
//!
//! None of these errors is fatal to the process. Callers either degrade
//! (skip a commit, store absent content) or surface a well-defined
//! "not found" / "cycle" result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChronicleError {
    /// Network or HTTP error talking to the remote host.
    #[error("remote fetch failed: {0}")]
    RemoteFetchFailure(String),

    /// The named commit does not exist upstream.
    #[error("commit {sha} not found upstream in {repo}")]
    CommitNotFound { repo: String, sha: String },

    /// The requested commit has not been ingested into the store.
    #[error("commit record not found: {repo}@{sha}")]
    RecordNotFound { repo: String, sha: String },

    /// The stored parent chain revisits a commit.
    #[error("cycle detected in parent chain of {repo} at {sha}")]
    CycleDetected { repo: String, sha: String },

    /// The parent chain is longer than the configured walk limit.
    #[error("parent chain walk exceeded {limit} commits")]
    DepthExceeded { limit: usize },

    /// A push notification is missing required fields.
    #[error("malformed push payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
