//! Push notification payloads.
//!
//! Only the fields ingestion needs are read: the repository full name, the
//! pushed ref, and each commit's id, message, and author. A payload missing
//! the repository name or any commit id is rejected as a whole.

use serde::Deserialize;

use crate::error::ChronicleError;
use crate::models::{Author, RepoName};

/// One commit listed in a push, in the order the sender listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCommit {
    pub id: String,
    pub message: String,
    pub author: Author,
}

/// A validated push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repo: RepoName,
    pub git_ref: Option<String>,
    pub commits: Vec<PushCommit>,
}

#[derive(Deserialize)]
struct RawPush {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    repository: Option<RawRepository>,
    #[serde(default)]
    commits: Option<Vec<RawCommit>>,
}

#[derive(Deserialize)]
struct RawRepository {
    full_name: Option<String>,
}

#[derive(Deserialize)]
struct RawCommit {
    id: Option<String>,
    message: Option<String>,
    #[serde(default)]
    author: Option<Author>,
}

impl PushEvent {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ChronicleError> {
        let raw: RawPush = serde_json::from_slice(body)
            .map_err(|e| ChronicleError::MalformedPayload(format!("invalid JSON: {}", e)))?;
        Self::from_raw(raw)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ChronicleError> {
        let raw: RawPush = serde_json::from_value(value)
            .map_err(|e| ChronicleError::MalformedPayload(format!("unexpected shape: {}", e)))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawPush) -> Result<Self, ChronicleError> {
        let full_name = raw
            .repository
            .and_then(|r| r.full_name)
            .ok_or_else(|| ChronicleError::MalformedPayload("missing repository.full_name".into()))?;
        let repo = RepoName::parse(&full_name).ok_or_else(|| {
            ChronicleError::MalformedPayload(format!("invalid repository name '{}'", full_name))
        })?;

        let commits = raw
            .commits
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(idx, c)| match c.id {
                Some(id) if !id.trim().is_empty() => Ok(PushCommit {
                    id,
                    message: c.message.unwrap_or_default(),
                    author: c.author.unwrap_or_default(),
                }),
                _ => Err(ChronicleError::MalformedPayload(format!(
                    "commit #{} has no id",
                    idx
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            repo,
            git_ref: raw.git_ref,
            commits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_push() {
        let event = PushEvent::from_value(json!({
            "ref": "refs/heads/main",
            "repository": { "full_name": "acme/widgets" },
            "commits": [
                { "id": "a1", "message": "first", "author": { "name": "Ada", "email": "ada@example.com", "username": "ada" } },
                { "id": "b2", "message": "second" }
            ]
        }))
        .unwrap();

        assert_eq!(event.repo.full_name(), "acme/widgets");
        assert_eq!(event.git_ref.as_deref(), Some("refs/heads/main"));
        let ids: Vec<&str> = event.commits.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert_eq!(event.commits[0].author.username.as_deref(), Some("ada"));
        assert_eq!(event.commits[1].author, Author::default());
    }

    #[test]
    fn test_no_commits_is_valid() {
        let event = PushEvent::from_value(json!({
            "repository": { "full_name": "acme/widgets" }
        }))
        .unwrap();
        assert!(event.commits.is_empty());
    }

    #[test]
    fn test_missing_repository_rejected() {
        let err = PushEvent::from_value(json!({ "commits": [] })).unwrap_err();
        assert!(matches!(err, ChronicleError::MalformedPayload(_)));

        let err = PushEvent::from_value(json!({ "repository": { "full_name": "widgets" } }))
            .unwrap_err();
        assert!(matches!(err, ChronicleError::MalformedPayload(_)));
    }

    #[test]
    fn test_missing_commit_id_rejects_event() {
        let err = PushEvent::from_value(json!({
            "repository": { "full_name": "acme/widgets" },
            "commits": [ { "id": "a1" }, { "message": "no id" } ]
        }))
        .unwrap_err();
        assert!(matches!(err, ChronicleError::MalformedPayload(ref m) if m.contains("#1")));
    }

    #[test]
    fn test_invalid_json() {
        let err = PushEvent::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, ChronicleError::MalformedPayload(_)));
    }
}
