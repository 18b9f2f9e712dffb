//! File reconstruction commands: `chron file` and `chron compare`.

use anyhow::{bail, Result};

use commit_chronicle_core::reconstruct::Reconstructor;

use crate::config::Config;
use crate::events::parse_repo;
use crate::sqlite_store;

/// Print a file's content as of `sha`.
pub async fn run_file(config: &Config, repo: &str, sha: &str, path: &str) -> Result<()> {
    let repo = parse_repo(repo)?;
    let store = sqlite_store::open(config).await?;
    let resolved = Reconstructor::new(&store)
        .with_max_depth(config.reconstruction.max_depth)
        .get_file_at_commit(&repo, sha, path)
        .await;
    store.close().await;

    let Some(resolved) = resolved? else {
        bail!("{} does not exist at {}", path, sha);
    };
    if !resolved.exact {
        eprintln!(
            "warning: {} could not be fully reconstructed; showing best-effort content",
            path
        );
    }
    print!("{}", resolved.content);
    if !resolved.content.is_empty() && !resolved.content.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Show a file before and after `sha`.
pub async fn run_compare(
    config: &Config,
    repo: &str,
    sha: &str,
    path: &str,
    json: bool,
) -> Result<()> {
    let repo = parse_repo(repo)?;
    let store = sqlite_store::open(config).await?;
    let comparison = Reconstructor::new(&store)
        .with_max_depth(config.reconstruction.max_depth)
        .get_file_comparison(&repo, sha, path)
        .await;
    store.close().await;
    let comparison = comparison?;

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }

    println!("{} @ {}: {}", comparison.filename, sha, comparison.status.as_str());
    if !comparison.exact {
        println!("(best-effort reconstruction)");
    }
    println!("--- before ({})", comparison.parent_sha.as_deref().unwrap_or("none"));
    if let Some(before) = &comparison.before {
        print!("{}", before);
        if !before.ends_with('\n') {
            println!();
        }
    }
    println!("+++ after ({})", comparison.commit_sha);
    if let Some(after) = &comparison.after {
        print!("{}", after);
        if !after.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}
