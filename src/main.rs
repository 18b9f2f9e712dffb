//! # Commit Chronicle CLI (`chron`)
//!
//! ## Usage
//!
//! ```bash
//! chron --config ./config/chron.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `chron init` | Create the SQLite database and run schema migrations |
//! | `chron repo add <url>` | Register a repository and create its webhook |
//! | `chron repo list` | List registered repositories |
//! | `chron ingest <owner/repo> <sha>...` | Capture commits without a webhook delivery |
//! | `chron events [owner/repo]` | Recent commit events |
//! | `chron show <owner/repo> <sha>` | Stored commit record |
//! | `chron file <owner/repo> <sha> <path>` | File content at a commit |
//! | `chron compare <owner/repo> <sha> <path>` | File before and after a commit |
//! | `chron report <owner/repo>` | Evolution report |
//! | `chron serve` | Start the webhook receiver and HTTP API |
//!
//! Logs go to stderr at info level, or debug with `--verbose`. A valid
//! `RUST_LOG` replaces that default entirely.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commit_chronicle::{config, events, file, ingest, migrate, report, repos, server};

/// Commit Chronicle: capture, classify, and reconstruct GitHub commit history.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/chron.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "chron",
    about = "Commit Chronicle: webhook-driven commit history capture for GitHub repositories",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/chron.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage registered repositories.
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },

    /// Fetch, classify, and store specific commits.
    Ingest {
        /// Repository as `owner/name`.
        repo: String,
        /// Commit SHAs, processed in the order given.
        #[arg(required = true)]
        shas: Vec<String>,
    },

    /// Show recent events, for one repository or all of them.
    Events {
        /// Repository as `owner/name`. Omit for all repositories.
        repo: Option<String>,
        /// Maximum number of events.
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Show a stored commit record.
    Show {
        repo: String,
        sha: String,
        /// Print the full record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a file as it existed at a commit.
    File {
        repo: String,
        sha: String,
        path: String,
    },

    /// Show a file before and after a commit.
    Compare {
        repo: String,
        sha: String,
        path: String,
        #[arg(long)]
        json: bool,
    },

    /// Summarize how a repository evolved.
    Report {
        repo: String,
        #[arg(long)]
        json: bool,
    },

    /// Start the webhook receiver and HTTP API.
    Serve,
}

#[derive(Subcommand)]
enum RepoAction {
    /// Register a repository by URL.
    Add {
        /// e.g. `https://github.com/acme/widgets`
        url: String,
        /// Do not create a GitHub webhook.
        #[arg(long)]
        no_webhook: bool,
    },
    /// List registered repositories.
    List,
}

/// `RUST_LOG`, when set and valid, wins over the `--verbose` default.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.to_string()))
}

fn init_tracing(verbose: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = log_filter(verbose, rust_log.as_deref());
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Repo { action } => match action {
            RepoAction::Add { url, no_webhook } => {
                repos::run_repo_add(&cfg, &url, no_webhook).await?;
            }
            RepoAction::List => {
                repos::run_repo_list(&cfg).await?;
            }
        },
        Commands::Ingest { repo, shas } => {
            ingest::run_ingest(&cfg, &repo, &shas).await?;
        }
        Commands::Events { repo, limit } => {
            events::run_events(&cfg, repo.as_deref(), limit).await?;
        }
        Commands::Show { repo, sha, json } => {
            events::run_show(&cfg, &repo, &sha, json).await?;
        }
        Commands::File { repo, sha, path } => {
            file::run_file(&cfg, &repo, &sha, &path).await?;
        }
        Commands::Compare {
            repo,
            sha,
            path,
            json,
        } => {
            file::run_compare(&cfg, &repo, &sha, &path, json).await?;
        }
        Commands::Report { repo, json } => {
            report::run_report(&cfg, &repo, json).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_log_filter_defaults() {
        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(true, None).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_rust_log_can_lower_level() {
        assert_eq!(
            log_filter(false, Some("warn")).max_level_hint(),
            Some(LevelFilter::WARN)
        );
        assert_eq!(
            log_filter(true, Some("error")).max_level_hint(),
            Some(LevelFilter::ERROR)
        );
    }
}
