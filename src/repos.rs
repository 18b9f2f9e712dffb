//! Repository registry commands.
//!
//! Registering a repository records it in the store and, when
//! `[server].public_url` is configured, creates a push webhook on GitHub
//! pointing at `<public_url>/webhook`. Used by `chron repo add` and
//! `POST /api/repos`.

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{info, warn};

use commit_chronicle_core::host::CommitHost;
use commit_chronicle_core::models::{RepoName, Repository};
use commit_chronicle_core::store::CommitStore;

use crate::config::{self, Config};
use crate::github::GitHubClient;
use crate::sqlite_store;

/// Result of a registration attempt.
#[derive(Debug)]
pub enum Registration {
    Added(Repository),
    AlreadyExists(RepoName),
}

/// Register `repo` unless it is already known.
///
/// Webhook creation failures are logged and leave `webhook_id` empty; the
/// repository is registered either way.
pub async fn register_repository(
    store: &dyn CommitStore,
    host: &dyn CommitHost,
    repo: RepoName,
    repo_url: &str,
    webhook_url: Option<&str>,
    secret: Option<&str>,
) -> Result<Registration> {
    if store.get_repository(&repo).await?.is_some() {
        return Ok(Registration::AlreadyExists(repo));
    }

    let webhook_id = match webhook_url {
        Some(callback) => match host.register_webhook(&repo, callback, secret).await {
            Ok(id) => {
                info!(repo = %repo, webhook_id = id, "webhook created");
                Some(id)
            }
            Err(e) => {
                warn!(repo = %repo, error = %e, "webhook registration failed");
                None
            }
        },
        None => None,
    };

    let repository = Repository {
        repo,
        repo_url: repo_url.trim().to_string(),
        webhook_id,
        created_at: Utc::now(),
    };
    if !store.add_repository(&repository).await? {
        return Ok(Registration::AlreadyExists(repository.repo));
    }
    info!(repo = %repository.repo, "repository registered");
    Ok(Registration::Added(repository))
}

/// `chron repo add <url>`
pub async fn run_repo_add(config: &Config, repo_url: &str, no_webhook: bool) -> Result<()> {
    let Some(repo) = RepoName::from_url(repo_url) else {
        bail!("not a repository URL: {}", repo_url);
    };

    let webhook_url = if no_webhook {
        None
    } else {
        let url = config.server.webhook_url();
        if url.is_none() {
            warn!("server.public_url not set; skipping webhook registration");
        }
        url
    };

    let store = sqlite_store::open(config).await?;
    let host = GitHubClient::new(&config.github, config::github_token())?;
    let secret = config::webhook_secret();
    let outcome = register_repository(
        &store,
        &host,
        repo,
        repo_url,
        webhook_url.as_deref(),
        secret.as_deref(),
    )
    .await;
    store.close().await;

    match outcome? {
        Registration::Added(repository) => {
            println!("Added {}", repository.repo);
            match repository.webhook_id {
                Some(id) => println!("  webhook: {}", id),
                None => println!("  webhook: none"),
            }
            Ok(())
        }
        Registration::AlreadyExists(repo) => bail!("repository already added: {}", repo),
    }
}

/// `chron repo list`
pub async fn run_repo_list(config: &Config) -> Result<()> {
    let store = sqlite_store::open(config).await?;
    let repos = store.list_repositories().await;
    store.close().await;
    let repos = repos?;

    if repos.is_empty() {
        println!("No repositories registered.");
        return Ok(());
    }

    println!("{:<40} {:<12} {}", "REPOSITORY", "WEBHOOK", "ADDED");
    for r in &repos {
        let webhook = r
            .webhook_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<40} {:<12} {}",
            r.repo.full_name(),
            webhook,
            r.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!();
    println!("{} repositories", repos.len());
    Ok(())
}
