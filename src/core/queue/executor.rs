//! Single-job pipeline: admit voice, plan chunks, synthesize in order,
//! stitch and persist.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::types::{Job, JobError};
use crate::core::artifacts::ArtifactStore;
use crate::core::voice::capacity::VoiceCapacityManager;
use crate::core::voice::chunking;
use crate::core::voice::models::ModelCatalog;
use crate::core::voice::providers::SynthesisClient;
use crate::core::voice::types::{NewVoice, VoiceError};

// ============================================================================
// Progress Reporting
// ============================================================================

/// Receives progress from a running job.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, progress: u8, stage: &str);

    fn voice_created(&self, _voice_id: &str) {}

    fn planned(&self, _chunk_count: usize) {}
}

/// How a job run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { output_path: PathBuf, output_size: u64 },
    Failed(JobError),
    Cancelled,
}

/// Synthesized audio for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub index: usize,
    pub audio: Vec<u8>,
}

/// Concatenate chunk audio in ascending index order.
pub fn stitch(mut chunks: Vec<AudioChunk>) -> Vec<u8> {
    chunks.sort_by_key(|c| c.index);
    let total = chunks.iter().map(|c| c.audio.len()).sum();
    let mut out = Vec::with_capacity(total);
    for chunk in chunks {
        out.extend_from_slice(&chunk.audio);
    }
    out
}

/// Highest progress reported before the artifact is saved; only a completed
/// job reaches 100.
const MAX_RUNNING_PROGRESS: u8 = 99;

/// `round(100 * done / total)`
fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 * 100.0 / total as f64).round() as u64).min(100) as u8
}

enum Halt {
    Cancelled,
    Failed(JobError),
}

impl From<VoiceError> for Halt {
    fn from(err: VoiceError) -> Self {
        Halt::Failed(JobError::from(&err))
    }
}

// ============================================================================
// Executor
// ============================================================================

pub struct JobExecutor {
    client: Arc<dyn SynthesisClient>,
    capacity: VoiceCapacityManager,
    models: Arc<ModelCatalog>,
    store: Arc<dyn ArtifactStore>,
}

impl JobExecutor {
    pub fn new(
        client: Arc<dyn SynthesisClient>,
        models: Arc<ModelCatalog>,
        store: Arc<dyn ArtifactStore>,
        max_voice_retries: u32,
    ) -> Self {
        Self {
            capacity: VoiceCapacityManager::new(Arc::clone(&client), max_voice_retries),
            client,
            models,
            store,
        }
    }

    pub fn capacity(&self) -> &VoiceCapacityManager {
        &self.capacity
    }

    /// Run `job` to a terminal outcome. Never panics on provider errors.
    #[instrument(skip_all, fields(job_id = %job.id, model = %job.model_id))]
    pub async fn run(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> JobOutcome {
        let mut voice_id = None;
        let outcome = match self.execute(job, cancel, sink, &mut voice_id).await {
            Ok((output_path, output_size)) => JobOutcome::Completed { output_path, output_size },
            Err(Halt::Failed(error)) => {
                log::error!("Job {} failed: {}", job.id, error);
                JobOutcome::Failed(error)
            }
            Err(Halt::Cancelled) => {
                log::info!("Job {} cancelled", job.id);
                JobOutcome::Cancelled
            }
        };

        if outcome == JobOutcome::Cancelled && job.delete_voice_on_cancel {
            if let Some(voice_id) = &voice_id {
                match self.client.delete_voice(voice_id).await {
                    Ok(()) | Err(VoiceError::NotFound(_)) => {
                        log::info!("Deleted voice {} of cancelled job {}", voice_id, job.id)
                    }
                    Err(e) => log::warn!("Failed to delete voice {}: {}", voice_id, e),
                }
            }
        }

        self.store.cleanup_temporary(&job.audio_files).await;
        outcome
    }

    async fn execute(
        &self,
        job: &Job,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
        voice_id: &mut Option<String>,
    ) -> Result<(PathBuf, u64), Halt> {
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        let model = self.models.resolve(&job.model_id)?;

        sink.progress(0, "Creating voice clone");
        let created = self
            .capacity
            .admit(NewVoice {
                name: &job.voice_name,
                description: job.description.as_deref(),
                samples: &job.audio_files,
            })
            .await?;
        sink.voice_created(&created);
        *voice_id = Some(created.clone());

        let plan = chunking::plan(&job.text, model.max_chunk_chars)?;
        let total = plan.len();
        sink.planned(total);
        log::info!(
            "Job {}: synthesizing {} chars in {} chunk(s) with {}",
            job.id,
            job.text.chars().count(),
            total,
            job.model_id
        );

        let settings = model.normalize_settings(&job.settings.clone().unwrap_or_default());
        let mut results = Vec::with_capacity(total);

        for chunk in plan.chunks() {
            if cancel.is_cancelled() {
                return Err(Halt::Cancelled);
            }
            sink.progress(
                percent(chunk.index, total),
                &format!("Synthesizing chunk {}/{}", chunk.index + 1, total),
            );

            let audio = self
                .client
                .synthesize(&created, &chunk.text, &job.model_id, &settings)
                .await
                .map_err(|e| Halt::Failed(JobError::from(&e).at_chunk(chunk.index)))?;
            results.push(AudioChunk { index: chunk.index, audio });

            sink.progress(
                percent(chunk.index + 1, total).min(MAX_RUNNING_PROGRESS),
                &format!("Synthesized chunk {}/{}", chunk.index + 1, total),
            );
        }

        let audio = stitch(results);
        sink.progress(MAX_RUNNING_PROGRESS, "Saving audio");
        let suggested = format!("{}_{}", job.id, job.voice_name);
        let path = self.store.save(&audio, &suggested).await.map_err(|e| {
            let detail = match e {
                VoiceError::StorageError(msg) => msg,
                other => other.to_string(),
            };
            Halt::Failed(JobError::from(&VoiceError::StorageError(detail)))
        })?;

        Ok((path, audio.len() as u64))
    }
}
