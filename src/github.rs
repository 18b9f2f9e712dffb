//! GitHub REST client implementing [`CommitHost`].
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | commit detail | `GET /repos/{owner}/{repo}/commits/{sha}` |
//! | file content | `GET /repos/{owner}/{repo}/contents/{path}?ref={ref}` |
//! | webhook registration | `POST /repos/{owner}/{repo}/hooks` |
//!
//! Every request is bounded by `github.timeout_secs`. The token, when set,
//! is sent as a bearer credential.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use commit_chronicle_core::error::ChronicleError;
use commit_chronicle_core::host::{
    ChangedFile, CommitDetail, CommitHost, CommitStats, ContentFetch,
};
use commit_chronicle_core::models::{Author, FileStatus, RepoName};

use crate::config::GitHubConfig;

pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn repo_url(&self, repo: &RepoName, rest: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, repo.owner, repo.name, rest)
    }

    /// Contents API URL with every path segment percent-encoded, so names
    /// containing `#`, `?` or spaces address the right file.
    fn contents_url(&self, repo: &RepoName, path: &str) -> std::result::Result<Url, String> {
        let mut url = Url::parse(&self.api_url).map_err(|e| format!("invalid api_url: {}", e))?;
        url.path_segments_mut()
            .map_err(|_| format!("api_url cannot be a base: {}", self.api_url))?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str(), "contents"])
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
    commit: ApiCommitInfo,
    #[serde(default)]
    author: Option<ApiUser>,
    #[serde(default)]
    parents: Vec<ApiParent>,
    #[serde(default)]
    files: Vec<ApiFile>,
    #[serde(default)]
    stats: Option<ApiStats>,
}

#[derive(Deserialize)]
struct ApiCommitInfo {
    #[serde(default)]
    message: String,
    #[serde(default)]
    author: Option<ApiGitAuthor>,
}

#[derive(Deserialize)]
struct ApiGitAuthor {
    name: Option<String>,
    email: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ApiUser {
    login: Option<String>,
}

#[derive(Deserialize)]
struct ApiParent {
    sha: String,
}

#[derive(Deserialize)]
struct ApiFile {
    filename: String,
    #[serde(default)]
    previous_filename: Option<String>,
    status: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changes: u64,
    #[serde(default)]
    patch: Option<String>,
}

#[derive(Deserialize)]
struct ApiStats {
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
}

#[derive(Deserialize)]
struct ApiContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct ApiHook {
    id: i64,
}

impl From<ApiCommit> for CommitDetail {
    fn from(api: ApiCommit) -> Self {
        let git_author = api.commit.author;
        let author = Author {
            name: git_author.as_ref().and_then(|a| a.name.clone()),
            email: git_author.as_ref().and_then(|a| a.email.clone()),
            username: api.author.and_then(|u| u.login),
        };
        let files = api
            .files
            .into_iter()
            .map(|f| ChangedFile {
                status: FileStatus::from_host(&f.status),
                filename: f.filename,
                previous_filename: f.previous_filename,
                additions: f.additions,
                deletions: f.deletions,
                changes: f.changes,
                patch: f.patch.unwrap_or_default(),
            })
            .collect::<Vec<_>>();
        let stats = match api.stats {
            Some(s) => CommitStats {
                additions: s.additions,
                deletions: s.deletions,
            },
            None => CommitStats {
                additions: files.iter().map(|f| f.additions).sum(),
                deletions: files.iter().map(|f| f.deletions).sum(),
            },
        };
        CommitDetail {
            sha: api.sha,
            message: api.commit.message,
            author,
            committed_at: git_author.and_then(|a| a.date),
            parent_shas: api.parents.into_iter().map(|p| p.sha).collect(),
            files,
            stats,
        }
    }
}

/// Decode a contents API payload. GitHub wraps base64 at 60 columns.
fn decode_content(api: ApiContent) -> std::result::Result<String, String> {
    let content = api.content.unwrap_or_default();
    match api.encoding.as_deref() {
        Some("base64") => {
            let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| format!("invalid base64: {}", e))?;
            String::from_utf8(bytes).map_err(|_| "content is not UTF-8 text".to_string())
        }
        Some("none") => Err("file too large for the contents API".to_string()),
        _ => Ok(content),
    }
}

fn transport(err: reqwest::Error) -> ChronicleError {
    ChronicleError::RemoteFetchFailure(err.to_string())
}

#[async_trait]
impl CommitHost for GitHubClient {
    async fn get_commit_detail(
        &self,
        repo: &RepoName,
        sha: &str,
    ) -> std::result::Result<CommitDetail, ChronicleError> {
        let url = self.repo_url(repo, &format!("commits/{}", sha));
        debug!(%url, "fetching commit detail");
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        // 422 is what GitHub answers for a syntactically invalid or unknown sha.
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ChronicleError::CommitNotFound {
                repo: repo.full_name(),
                sha: sha.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChronicleError::RemoteFetchFailure(format!(
                "GitHub API error {} for {}: {}",
                status, url, body
            )));
        }

        let api: ApiCommit = response.json().await.map_err(transport)?;
        Ok(api.into())
    }

    async fn get_file_content(&self, repo: &RepoName, path: &str, git_ref: &str) -> ContentFetch {
        let url = match self.contents_url(repo, path) {
            Ok(url) => url,
            Err(reason) => return ContentFetch::Failed(reason),
        };
        let response = match self
            .authorize(self.client.get(url.clone()))
            .query(&[("ref", git_ref)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return ContentFetch::Failed(e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return ContentFetch::Missing;
        }
        if !status.is_success() {
            return ContentFetch::Failed(format!("GitHub API error {} for {}", status, url));
        }

        match response.json::<ApiContent>().await {
            Ok(api) => match decode_content(api) {
                Ok(content) => ContentFetch::Present(content),
                Err(reason) => ContentFetch::Failed(reason),
            },
            Err(e) => ContentFetch::Failed(e.to_string()),
        }
    }

    async fn register_webhook(
        &self,
        repo: &RepoName,
        callback_url: &str,
        secret: Option<&str>,
    ) -> std::result::Result<i64, ChronicleError> {
        if self.token.is_none() {
            return Err(ChronicleError::RemoteFetchFailure(
                "GITHUB_TOKEN environment variable not set".to_string(),
            ));
        }

        let mut config = serde_json::json!({
            "url": callback_url,
            "content_type": "json",
            "insecure_ssl": "0",
        });
        if let Some(secret) = secret {
            config["secret"] = serde_json::Value::String(secret.to_string());
        }
        let body = serde_json::json!({
            "name": "web",
            "active": true,
            "events": ["push"],
            "config": config,
        });

        let url = self.repo_url(repo, "hooks");
        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChronicleError::RemoteFetchFailure(format!(
                "GitHub API error {} creating webhook: {}",
                status, body
            )));
        }

        let hook: ApiHook = response.json().await.map_err(transport)?;
        Ok(hook.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_wrapped_base64() {
        let encoded = STANDARD.encode("fn main() {\n    println!(\"hi\");\n}\n");
        let (a, b) = encoded.split_at(10);
        let api = ApiContent {
            content: Some(format!("{}\n{}\n", a, b)),
            encoding: Some("base64".to_string()),
        };
        assert_eq!(
            decode_content(api).unwrap(),
            "fn main() {\n    println!(\"hi\");\n}\n"
        );
    }

    #[test]
    fn test_decode_rejects_binary_and_oversized() {
        let api = ApiContent {
            content: Some(STANDARD.encode([0xff, 0xfe, 0x00])),
            encoding: Some("base64".to_string()),
        };
        assert!(decode_content(api).is_err());

        let api = ApiContent {
            content: Some(String::new()),
            encoding: Some("none".to_string()),
        };
        assert!(decode_content(api).is_err());
    }

    fn client(api_url: &str) -> GitHubClient {
        let config = GitHubConfig {
            api_url: api_url.to_string(),
            ..GitHubConfig::default()
        };
        GitHubClient::new(&config, None).unwrap()
    }

    #[test]
    fn test_contents_url_encodes_segments() {
        let repo = RepoName::new("acme", "widgets");
        let url = client("https://api.github.com")
            .contents_url(&repo, "docs/notes #1?.md")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/widgets/contents/docs/notes%20%231%3F.md"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_contents_url_keeps_api_prefix() {
        let repo = RepoName::new("acme", "widgets");
        let url = client("https://ghe.example.com/api/v3")
            .contents_url(&repo, "src/main.rs")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/acme/widgets/contents/src/main.rs"
        );
    }

    #[test]
    fn test_commit_detail_mapping() {
        let json = serde_json::json!({
            "sha": "abc123",
            "commit": {
                "message": "Add parser",
                "author": { "name": "Ada", "email": "ada@example.com", "date": "2024-03-01T12:00:00Z" }
            },
            "author": { "login": "ada" },
            "parents": [ { "sha": "p1" }, { "sha": "p2" } ],
            "stats": { "additions": 12, "deletions": 3, "total": 15 },
            "files": [
                { "filename": "src/new.rs", "status": "renamed", "previous_filename": "src/old.rs",
                  "additions": 12, "deletions": 3, "changes": 15, "patch": "@@ -1 +1 @@\n-a\n+b" },
                { "filename": "logo.png", "status": "added", "additions": 0, "deletions": 0, "changes": 0 }
            ]
        });
        let api: ApiCommit = serde_json::from_value(json).unwrap();
        let detail: CommitDetail = api.into();

        assert_eq!(detail.sha, "abc123");
        assert_eq!(detail.parent_shas, vec!["p1", "p2"]);
        assert_eq!(detail.author.username.as_deref(), Some("ada"));
        assert!(detail.committed_at.is_some());
        assert_eq!(detail.stats.additions, 12);
        assert_eq!(detail.files[0].status, FileStatus::Renamed);
        assert_eq!(detail.files[0].previous_filename.as_deref(), Some("src/old.rs"));
        assert_eq!(detail.files[1].patch, "");
    }
}
