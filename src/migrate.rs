use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Registered repositories
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            full_name TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            name TEXT NOT NULL,
            repo_url TEXT NOT NULL,
            webhook_id INTEGER,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // One row per (repository, commit). The full record is kept as JSON;
    // the event columns serve the feed queries without decoding it.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            repository TEXT NOT NULL,
            commit_sha TEXT NOT NULL,
            parent_sha TEXT,
            ingested_at INTEGER NOT NULL,
            event_type TEXT NOT NULL,
            description TEXT NOT NULL,
            files_changed INTEGER NOT NULL,
            record_json TEXT NOT NULL,
            PRIMARY KEY (repository, commit_sha)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_commits_repo_ingested ON commits(repository, ingested_at)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_commits_ingested ON commits(ingested_at DESC)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
