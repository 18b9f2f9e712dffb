use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use commit_chronicle_core::reconstruct::DEFAULT_MAX_DEPTH;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("commit-chronicle/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Externally reachable base URL; webhooks are registered against
    /// `<public_url>/webhook`.
    #[serde(default)]
    pub public_url: Option<String>,
}

impl ServerConfig {
    pub fn webhook_url(&self) -> Option<String> {
        self.public_url
            .as_deref()
            .map(|base| format!("{}/webhook", base.trim_end_matches('/')))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReconstructionConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Token for the GitHub API, from `GITHUB_TOKEN`. Public repositories can
/// be read without one.
pub fn github_token() -> Option<String> {
    non_empty_env("GITHUB_TOKEN")
}

/// Shared secret for webhook signatures, from `WEBHOOK_SECRET`. When unset,
/// deliveries are accepted unsigned.
pub fn webhook_secret() -> Option<String> {
    non_empty_env("WEBHOOK_SECRET")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.github.timeout_secs == 0 {
        anyhow::bail!("github.timeout_secs must be > 0");
    }

    if !is_http_url(&config.github.api_url) {
        anyhow::bail!(
            "github.api_url must be an http(s) URL, got '{}'",
            config.github.api_url
        );
    }

    if let Some(ref public_url) = config.server.public_url {
        if !is_http_url(public_url) {
            anyhow::bail!("server.public_url must be an http(s) URL, got '{}'", public_url);
        }
    }

    if config.reconstruction.max_depth == 0 {
        anyhow::bail!("reconstruction.max_depth must be > 0");
    }

    Ok(config)
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
