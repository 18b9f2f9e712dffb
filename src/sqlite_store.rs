//! SQLite-backed [`CommitStore`] implementation.
//!
//! Each commit record is stored whole as JSON in `commits.record_json`,
//! alongside the handful of columns the event feeds sort and project on.
//! Upserts use `ON CONFLICT ... DO UPDATE`, which keeps the row's `rowid`,
//! so a rewritten record keeps its place among same-timestamp neighbours.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use commit_chronicle_core::models::{
    CommitRecord, EventSummary, EventType, RepoName, Repository,
};
use commit_chronicle_core::store::CommitStore;

use crate::config::Config;
use crate::db;

/// Connect to the configured database. Run `chron init` first so the
/// tables exist.
pub async fn open(config: &Config) -> Result<SqliteStore> {
    Ok(SqliteStore::new(db::connect(config).await?))
}

/// SQLite implementation of the [`CommitStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

fn parse_event_type(raw: &str) -> Result<EventType> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .with_context(|| format!("unknown event type in store: {}", raw))
}

fn event_from_row(row: &SqliteRow) -> Result<EventSummary> {
    let event_type: String = row.get("event_type");
    let files_changed: i64 = row.get("files_changed");
    Ok(EventSummary {
        repository: row.get("repository"),
        commit_sha: row.get("commit_sha"),
        parent_sha: row.get("parent_sha"),
        event_type: parse_event_type(&event_type)?,
        description: row.get("description"),
        files_changed: files_changed.max(0) as usize,
        timestamp: from_micros(row.get("ingested_at")),
    })
}

fn record_from_row(row: &SqliteRow) -> Result<CommitRecord> {
    let json: String = row.get("record_json");
    let sha: String = row.get("commit_sha");
    serde_json::from_str(&json).with_context(|| format!("corrupt commit record {}", sha))
}

fn repository_from_row(row: &SqliteRow) -> Result<Repository> {
    let created_at: String = row.get("created_at");
    Ok(Repository {
        repo: RepoName::new(row.get::<String, _>("owner"), row.get::<String, _>("name")),
        repo_url: row.get("repo_url"),
        webhook_id: row.get("webhook_id"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .with_context(|| format!("invalid created_at: {}", created_at))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl CommitStore for SqliteStore {
    async fn put_record(&self, repo: &RepoName, record: &CommitRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            INSERT INTO commits (repository, commit_sha, parent_sha, ingested_at,
                                 event_type, description, files_changed, record_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(repository, commit_sha) DO UPDATE SET
                parent_sha = excluded.parent_sha,
                ingested_at = excluded.ingested_at,
                event_type = excluded.event_type,
                description = excluded.description,
                files_changed = excluded.files_changed,
                record_json = excluded.record_json
            "#,
        )
        .bind(repo.full_name())
        .bind(&record.commit_sha)
        .bind(&record.parent_sha)
        .bind(record.ingested_at.timestamp_micros())
        .bind(record.event.event_type.as_str())
        .bind(&record.event.description)
        .bind(record.event.files_changed as i64)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_record(&self, repo: &RepoName, sha: &str) -> Result<Option<CommitRecord>> {
        let row = sqlx::query(
            "SELECT commit_sha, record_json FROM commits WHERE repository = ? AND commit_sha = ?",
        )
        .bind(repo.full_name())
        .bind(sha)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_records(&self, repo: &RepoName) -> Result<Vec<CommitRecord>> {
        let rows = sqlx::query(
            "SELECT commit_sha, record_json FROM commits WHERE repository = ? \
             ORDER BY ingested_at ASC, rowid ASC",
        )
        .bind(repo.full_name())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn recent_events(&self, repo: &RepoName, limit: usize) -> Result<Vec<EventSummary>> {
        let rows = sqlx::query(
            "SELECT repository, commit_sha, parent_sha, ingested_at, event_type, description, files_changed \
             FROM commits WHERE repository = ? ORDER BY ingested_at DESC, rowid DESC LIMIT ?",
        )
        .bind(repo.full_name())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn all_recent_events(&self, limit: usize) -> Result<Vec<EventSummary>> {
        let rows = sqlx::query(
            "SELECT repository, commit_sha, parent_sha, ingested_at, event_type, description, files_changed \
             FROM commits ORDER BY ingested_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn add_repository(&self, repository: &Repository) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO repositories (full_name, owner, name, repo_url, webhook_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(full_name) DO NOTHING
            "#,
        )
        .bind(repository.repo.full_name())
        .bind(&repository.repo.owner)
        .bind(&repository.repo.name)
        .bind(&repository.repo_url)
        .bind(repository.webhook_id)
        .bind(repository.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_repository(&self, repo: &RepoName) -> Result<Option<Repository>> {
        let row = sqlx::query(
            "SELECT owner, name, repo_url, webhook_id, created_at FROM repositories WHERE full_name = ?",
        )
        .bind(repo.full_name())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(repository_from_row).transpose()
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let rows = sqlx::query(
            "SELECT owner, name, repo_url, webhook_id, created_at FROM repositories ORDER BY full_name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(repository_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, GitHubConfig, ReconstructionConfig, ServerConfig};
    use crate::migrate;
    use chrono::TimeZone;
    use commit_chronicle_core::models::{Author, Event, FileDiff, FileStatus, StorageType};
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, SqliteStore) {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            db: DbConfig {
                path: tmp.path().join("data").join("chron.sqlite"),
            },
            github: GitHubConfig::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                public_url: None,
            },
            reconstruction: ReconstructionConfig::default(),
        };
        migrate::run_migrations(&config).await.unwrap();
        (tmp, open(&config).await.unwrap())
    }

    fn record(sha: &str, secs: i64) -> CommitRecord {
        CommitRecord {
            commit_sha: sha.to_string(),
            parent_sha: Some("p".to_string()),
            ingested_at: Utc.timestamp_opt(secs, 0).unwrap(),
            committed_at: None,
            message: "Fix parser".to_string(),
            author: Author::default(),
            event: Event {
                event_type: EventType::BugFix,
                description: "Bug fix".to_string(),
                files_changed: 1,
                total_additions: 1,
                total_deletions: 1,
            },
            files: vec![FileDiff {
                filename: "src/parse.rs".to_string(),
                previous_filename: None,
                status: FileStatus::Modified,
                additions: 1,
                deletions: 1,
                changes: 2,
                patch: "@@ -1 +1 @@\n-a\n+b".to_string(),
                before: None,
                after: None,
                storage: StorageType::PatchOnly,
            }],
        }
    }

    #[tokio::test]
    async fn test_record_roundtrip_and_upsert() {
        let (_tmp, store) = open_store().await;
        let repo = RepoName::new("acme", "widgets");
        let rec = record("abc", 100);

        store.put_record(&repo, &rec).await.unwrap();
        store.put_record(&repo, &rec).await.unwrap();

        assert_eq!(store.get_record(&repo, "abc").await.unwrap(), Some(rec));
        assert_eq!(store.list_records(&repo).await.unwrap().len(), 1);
        assert!(store
            .get_record(&RepoName::new("acme", "other"), "abc")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_ordering() {
        let (_tmp, store) = open_store().await;
        let widgets = RepoName::new("acme", "widgets");
        let gadgets = RepoName::new("acme", "gadgets");
        store.put_record(&widgets, &record("c3", 30)).await.unwrap();
        store.put_record(&widgets, &record("a1", 10)).await.unwrap();
        store.put_record(&widgets, &record("b2", 10)).await.unwrap();
        store.put_record(&gadgets, &record("g1", 20)).await.unwrap();

        let shas: Vec<String> = store
            .list_records(&widgets)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.commit_sha)
            .collect();
        assert_eq!(shas, vec!["a1", "b2", "c3"]);

        let recent = store.recent_events(&widgets, 2).await.unwrap();
        assert_eq!(recent[0].commit_sha, "c3");
        assert_eq!(recent[1].commit_sha, "b2");
        assert_eq!(recent[0].event_type, EventType::BugFix);

        let all = store.all_recent_events(100).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[1].repository, "acme/gadgets");
    }

    #[tokio::test]
    async fn test_repository_registry() {
        let (_tmp, store) = open_store().await;
        let repo = Repository {
            repo: RepoName::new("acme", "widgets"),
            repo_url: "https://github.com/acme/widgets".to_string(),
            webhook_id: Some(42),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };
        assert!(store.add_repository(&repo).await.unwrap());
        assert!(!store.add_repository(&repo).await.unwrap());
        assert_eq!(store.get_repository(&repo.repo).await.unwrap(), Some(repo));
        assert_eq!(store.list_repositories().await.unwrap().len(), 1);
    }
}
