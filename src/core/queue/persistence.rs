//! Job state persistence
//!
//! Jobs are written through a [`JobRepository`] on every state change so a
//! status query can be answered after a restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use super::types::Job;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn save(&self, job: &Job) -> RepositoryResult<()>;

    async fn load_all(&self) -> RepositoryResult<Vec<Job>>;

    async fn delete(&self, job_id: &str) -> RepositoryResult<()>;
}

// ============================================================================
// In-Memory Repository
// ============================================================================

/// Keeps jobs for the lifetime of the process only.
#[derive(Default)]
pub struct InMemoryRepository {
    jobs: Mutex<HashMap<String, Job>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_id)
            .cloned()
    }
}

#[async_trait]
impl JobRepository for InMemoryRepository {
    async fn save(&self, job: &Job) -> RepositoryResult<()> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn load_all(&self) -> RepositoryResult<Vec<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect())
    }

    async fn delete(&self, job_id: &str) -> RepositoryResult<()> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).remove(job_id);
        Ok(())
    }
}

// ============================================================================
// JSON File Repository
// ============================================================================

/// One `<job_id>.json` file per job, replaced atomically on each save.
pub struct JsonFileRepository {
    dir: PathBuf,
}

impl JsonFileRepository {
    pub fn new(dir: impl Into<PathBuf>) -> RepositoryResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }
}

#[async_trait]
impl JobRepository for JsonFileRepository {
    async fn save(&self, job: &Job) -> RepositoryResult<()> {
        let data = serde_json::to_vec_pretty(job)?;
        let target = self.path_for(&job.id);
        let tmp = self.dir.join(format!(".{}.json.tmp", job.id));

        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &target).await?;
        Ok(())
    }

    async fn load_all(&self) -> RepositoryResult<Vec<Job>> {
        let mut jobs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = match tokio::fs::read(&path).await {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Skipping unreadable job file {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_slice::<Job>(&data) {
                Ok(job) => jobs.push(job),
                Err(e) => log::warn!("Skipping corrupt job file {}: {}", path.display(), e),
            }
        }

        Ok(jobs)
    }

    async fn delete(&self, job_id: &str) -> RepositoryResult<()> {
        match tokio::fs::remove_file(self.path_for(job_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
