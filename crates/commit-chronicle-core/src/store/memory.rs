//! In-memory [`CommitStore`] implementation for tests and embedding.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Every record carries a
//! write sequence number so chronological listings stay stable when two
//! records share an ingestion timestamp.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{CommitRecord, EventSummary, RepoName, Repository};

use super::CommitStore;

struct StoredRecord {
    seq: u64,
    record: CommitRecord,
}

/// In-memory store for tests.
pub struct InMemoryStore {
    records: RwLock<HashMap<RepoName, HashMap<String, StoredRecord>>>,
    repositories: RwLock<BTreeMap<RepoName, Repository>>,
    next_seq: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            repositories: RwLock::new(BTreeMap::new()),
            next_seq: AtomicU64::new(0),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

fn newest_first(events: &mut [(u64, EventSummary)]) {
    events.sort_by(|a, b| {
        b.1.timestamp
            .cmp(&a.1.timestamp)
            .then_with(|| b.0.cmp(&a.0))
    });
}

#[async_trait]
impl CommitStore for InMemoryStore {
    async fn put_record(&self, repo: &RepoName, record: &CommitRecord) -> Result<()> {
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let repo_records = records.entry(repo.clone()).or_default();
        match repo_records.get_mut(&record.commit_sha) {
            Some(stored) => stored.record = record.clone(),
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                repo_records.insert(
                    record.commit_sha.clone(),
                    StoredRecord {
                        seq,
                        record: record.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn get_record(&self, repo: &RepoName, sha: &str) -> Result<Option<CommitRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .get(repo)
            .and_then(|r| r.get(sha))
            .map(|stored| stored.record.clone()))
    }

    async fn list_records(&self, repo: &RepoName) -> Result<Vec<CommitRecord>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let Some(repo_records) = records.get(repo) else {
            return Ok(Vec::new());
        };
        let mut stored: Vec<&StoredRecord> = repo_records.values().collect();
        stored.sort_by(|a, b| {
            a.record
                .ingested_at
                .cmp(&b.record.ingested_at)
                .then_with(|| a.seq.cmp(&b.seq))
        });
        Ok(stored.into_iter().map(|s| s.record.clone()).collect())
    }

    async fn recent_events(&self, repo: &RepoName, limit: usize) -> Result<Vec<EventSummary>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let mut events: Vec<(u64, EventSummary)> = records
            .get(repo)
            .map(|r| {
                r.values()
                    .map(|s| (s.seq, EventSummary::from_record(repo, &s.record)))
                    .collect()
            })
            .unwrap_or_default();
        newest_first(&mut events);
        Ok(events.into_iter().take(limit).map(|(_, e)| e).collect())
    }

    async fn all_recent_events(&self, limit: usize) -> Result<Vec<EventSummary>> {
        let records = self.records.read().map_err(|_| poisoned())?;
        let mut events: Vec<(u64, EventSummary)> = records
            .iter()
            .flat_map(|(repo, r)| {
                r.values()
                    .map(move |s| (s.seq, EventSummary::from_record(repo, &s.record)))
            })
            .collect();
        newest_first(&mut events);
        Ok(events.into_iter().take(limit).map(|(_, e)| e).collect())
    }

    async fn add_repository(&self, repository: &Repository) -> Result<bool> {
        let mut repos = self.repositories.write().map_err(|_| poisoned())?;
        if repos.contains_key(&repository.repo) {
            return Ok(false);
        }
        repos.insert(repository.repo.clone(), repository.clone());
        Ok(true)
    }

    async fn get_repository(&self, repo: &RepoName) -> Result<Option<Repository>> {
        let repos = self.repositories.read().map_err(|_| poisoned())?;
        Ok(repos.get(repo).cloned())
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        let repos = self.repositories.read().map_err(|_| poisoned())?;
        Ok(repos.values().cloned().collect())
    }
}
