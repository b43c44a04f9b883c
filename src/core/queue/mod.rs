//! Voice Clone Job Queue
//!
//! Owns every job, admits pending jobs FIFO into a bounded worker pool and
//! exposes status, cancellation and retention operations. Each admitted job
//! runs on its own tokio task through a [`JobExecutor`].

pub mod events;
pub mod executor;
pub mod persistence;
mod types;


pub use events::{channels, JobStatusEvent, JobSubmittedEvent, QueueEventEmitter, QueueStatsEvent};
pub use executor::{stitch, AudioChunk, JobExecutor, JobOutcome, ProgressSink};
pub use persistence::{InMemoryRepository, JobRepository, JsonFileRepository};
pub use types::{
    CancelOutcome, Job, JobError, JobSpec, JobStatus, QueueConfig, QueueError, QueueResult,
    QueueStats,
};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;

use events::{emit_event, NoopEmitter};
use crate::core::artifacts::ArtifactStore;
use crate::core::notify::{JobNotification, NoopNotifier, Notifier};
use crate::core::voice::capacity::VoiceCapacityManager;
use crate::core::voice::models::ModelCatalog;
use crate::core::voice::providers::SynthesisClient;
use crate::core::voice::types::ErrorKind;

/// Processing-time samples kept for the running average
const PROCESSING_SAMPLES: usize = 100;

// ============================================================================
// Internal Queue State
// ============================================================================

struct QueueState {
    jobs: HashMap<String, Job>,
    /// Pending job ids in submission order
    pending: VecDeque<String>,
    /// Cancellation tokens of processing jobs
    processing: HashMap<String, CancellationToken>,
    total_submitted: u64,
    completed_count: u64,
    failed_count: u64,
    cancelled_count: u64,
    peak_processing: usize,
    processing_times: VecDeque<i64>,
    shutdown: bool,
}

impl QueueState {
    fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            pending: VecDeque::new(),
            processing: HashMap::new(),
            total_submitted: 0,
            completed_count: 0,
            failed_count: 0,
            cancelled_count: 0,
            peak_processing: 0,
            processing_times: VecDeque::new(),
            shutdown: false,
        }
    }

    fn record_terminal(&mut self, job: &Job) {
        match job.status {
            JobStatus::Completed => self.completed_count += 1,
            JobStatus::Failed => self.failed_count += 1,
            JobStatus::Cancelled => self.cancelled_count += 1,
            JobStatus::Pending | JobStatus::Processing => {}
        }
        if let Some(ms) = job.processing_ms() {
            self.processing_times.push_back(ms);
            if self.processing_times.len() > PROCESSING_SAMPLES {
                self.processing_times.pop_front();
            }
        }
    }
}

enum PersistOp {
    Save(Box<Job>),
    Delete(String),
    Flush(oneshot::Sender<()>),
}

struct QueueInner {
    config: QueueConfig,
    models: Arc<ModelCatalog>,
    executor: JobExecutor,
    state: Mutex<QueueState>,
    notifier: Arc<dyn Notifier>,
    emitter: Arc<dyn QueueEventEmitter>,
    repository: Arc<dyn JobRepository>,
    persist_tx: mpsc::UnboundedSender<PersistOp>,
    /// Signalled whenever the processing set drains
    idle: Notify,
}

// ============================================================================
// Builder
// ============================================================================

pub struct QueueBuilder {
    config: QueueConfig,
    client: Arc<dyn SynthesisClient>,
    store: Arc<dyn ArtifactStore>,
    models: ModelCatalog,
    repository: Arc<dyn JobRepository>,
    notifier: Arc<dyn Notifier>,
    emitter: Arc<dyn QueueEventEmitter>,
}

impl QueueBuilder {
    pub fn with_models(mut self, models: ModelCatalog) -> Self {
        self.models = models;
        self
    }

    pub fn with_repository(mut self, repository: Arc<dyn JobRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn QueueEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Build the queue. Must be called inside a tokio runtime.
    pub fn build(self) -> QueueManager {
        let models = Arc::new(self.models);
        let executor = JobExecutor::new(
            self.client,
            Arc::clone(&models),
            self.store,
            self.config.max_voice_retries,
        );
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(persist_loop(Arc::clone(&self.repository), persist_rx));

        QueueManager {
            inner: Arc::new(QueueInner {
                config: self.config,
                models,
                executor,
                state: Mutex::new(QueueState::new()),
                notifier: self.notifier,
                emitter: self.emitter,
                repository: self.repository,
                persist_tx,
                idle: Notify::new(),
            }),
        }
    }
}

/// Applies repository writes in the order state changes happened.
async fn persist_loop(repository: Arc<dyn JobRepository>, mut rx: mpsc::UnboundedReceiver<PersistOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            PersistOp::Save(job) => {
                if let Err(e) = repository.save(&job).await {
                    log::warn!("Failed to persist job {}: {}", job.id, e);
                }
            }
            PersistOp::Delete(job_id) => {
                if let Err(e) = repository.delete(&job_id).await {
                    log::warn!("Failed to delete persisted job {}: {}", job_id, e);
                }
            }
            PersistOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

// ============================================================================
// Queue Manager
// ============================================================================

/// Handle to the job queue; cheap to clone.
#[derive(Clone)]
pub struct QueueManager {
    inner: Arc<QueueInner>,
}

impl QueueManager {
    pub fn builder(
        config: QueueConfig,
        client: Arc<dyn SynthesisClient>,
        store: Arc<dyn ArtifactStore>,
    ) -> QueueBuilder {
        QueueBuilder {
            config,
            client,
            store,
            models: ModelCatalog::default(),
            repository: Arc::new(InMemoryRepository::new()),
            notifier: Arc::new(NoopNotifier),
            emitter: Arc::new(NoopEmitter),
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    pub fn models(&self) -> &ModelCatalog {
        &self.inner.models
    }

    /// Voice capacity manager shared with the job executor
    pub fn capacity(&self) -> &VoiceCapacityManager {
        self.inner.executor.capacity()
    }

    /// Submit a new job; it starts at once if a worker slot is free.
    pub fn submit(&self, spec: JobSpec) -> QueueResult<String> {
        if !self.inner.models.contains(&spec.model_id) {
            return Err(QueueError::InvalidInput(format!("Unknown model: {}", spec.model_id)));
        }

        let job = {
            let mut state = self.inner.lock();
            if state.shutdown {
                return Err(QueueError::Shutdown);
            }
            let max = self.inner.config.max_queue_size;
            if max > 0 && state.pending.len() >= max {
                return Err(QueueError::QueueFull);
            }

            let mut id = Job::generate_id();
            while state.jobs.contains_key(&id) {
                id = Job::generate_id();
            }
            let job = Job::new(id.clone(), spec);
            state.jobs.insert(id.clone(), job.clone());
            state.pending.push_back(id);
            state.total_submitted += 1;
            self.inner.persist(&job);
            job
        };

        log::info!(
            "Voice clone job {} submitted (voice: {}, model: {}, chars: {}, samples: {})",
            job.id,
            job.voice_name,
            job.model_id,
            job.text.chars().count(),
            job.audio_files.len()
        );
        emit_event(
            self.inner.emitter.as_ref(),
            channels::JOB_SUBMITTED,
            &JobSubmittedEvent::from_job(&job),
        );

        self.inner.dispatch();
        Ok(job.id)
    }

    /// Snapshot of a job.
    pub fn status(&self, job_id: &str) -> QueueResult<Job> {
        self.inner
            .lock()
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(job_id.to_string()))
    }

    /// Cancel a pending job, or ask a processing job to stop.
    pub fn cancel(&self, job_id: &str) -> QueueResult<CancelOutcome> {
        let cancelled = {
            let mut state = self.inner.lock();
            let job = state
                .jobs
                .get_mut(job_id)
                .ok_or_else(|| QueueError::NotFound(job_id.to_string()))?;

            let status = job.status;
            match status {
                JobStatus::Pending => {
                    job.mark_cancelled();
                    let snapshot = job.clone();
                    state.pending.retain(|id| id != job_id);
                    state.record_terminal(&snapshot);
                    self.inner.persist(&snapshot);
                    snapshot
                }
                JobStatus::Processing => {
                    job.cancel_requested = true;
                    job.stage = "Cancellation requested".to_string();
                    let snapshot = job.clone();
                    if let Some(token) = state.processing.get(job_id) {
                        token.cancel();
                    }
                    self.inner.persist(&snapshot);
                    drop(state);
                    log::info!("Cancellation requested for processing job {}", job_id);
                    return Ok(CancelOutcome::CancellationRequested);
                }
                status => {
                    return Err(QueueError::AlreadyTerminal {
                        job_id: job_id.to_string(),
                        status,
                    })
                }
            }
        };

        log::info!("Pending job {} cancelled", job_id);
        self.inner.announce_terminal(cancelled);
        Ok(CancelOutcome::Cancelled)
    }

    /// Jobs newest first, optionally filtered by status.
    pub fn list(&self, status: Option<JobStatus>, limit: Option<usize>) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .inner
            .lock()
            .jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            jobs.truncate(limit);
        }
        jobs
    }

    pub fn stats(&self) -> QueueStats {
        self.inner.stats()
    }

    /// Drop terminal jobs that finished more than `max_age` ago.
    pub fn cleanup_old_jobs(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };
        let removed: Vec<String> = {
            let mut state = self.inner.lock();
            let expired: Vec<String> = state
                .jobs
                .values()
                .filter(|j| j.status.is_terminal())
                .filter(|j| j.completed_at.unwrap_or(j.updated_at) < cutoff)
                .map(|j| j.id.clone())
                .collect();
            for id in &expired {
                state.jobs.remove(id);
                let _ = self.inner.persist_tx.send(PersistOp::Delete(id.clone()));
            }
            expired
        };

        if !removed.is_empty() {
            log::info!("Removed {} expired job(s)", removed.len());
        }
        removed.len()
    }

    /// Load persisted jobs. Jobs that were still pending or processing are
    /// marked failed as interrupted; nothing is re-run.
    pub async fn restore(&self) -> QueueResult<usize> {
        let stored = self
            .inner
            .repository
            .load_all()
            .await
            .map_err(|e| QueueError::Persistence(e.to_string()))?;

        let mut interrupted = Vec::new();
        let mut restored = 0;
        {
            let mut state = self.inner.lock();
            for mut job in stored {
                if state.jobs.contains_key(&job.id) {
                    continue;
                }
                if !job.status.is_terminal() {
                    job.mark_failed(JobError::interrupted());
                    self.inner.persist(&job);
                    interrupted.push(job.clone());
                }
                state.jobs.insert(job.id.clone(), job);
                restored += 1;
            }
        }

        for job in &interrupted {
            log::warn!("Job {} was interrupted by a restart", job.id);
        }
        log::info!(
            "Restored {} job(s), {} marked interrupted",
            restored,
            interrupted.len()
        );
        Ok(restored)
    }

    /// Stop admitting work, cancel running jobs and wait up to `grace` for
    /// them to wind down. Pending jobs stay pending.
    pub async fn shutdown(&self, grace: Duration) {
        {
            let mut state = self.inner.lock();
            state.shutdown = true;
            for token in state.processing.values() {
                token.cancel();
            }
        }
        log::info!("Voice clone queue shutting down");

        let drained = tokio::time::timeout(grace, async {
            loop {
                let idle = self.inner.idle.notified();
                if self.inner.lock().processing.is_empty() {
                    break;
                }
                idle.await;
            }
        })
        .await;
        if drained.is_err() {
            log::warn!("Shutdown grace period elapsed with jobs still running");
        }

        let (done_tx, done_rx) = oneshot::channel();
        if self.inner.persist_tx.send(PersistOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.lock().shutdown
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a save. Call with the state lock held so the writer sees saves
    /// in transition order.
    fn persist(&self, job: &Job) {
        let _ = self.persist_tx.send(PersistOp::Save(Box::new(job.clone())));
    }

    fn stats(&self) -> QueueStats {
        let state = self.lock();
        let max = self.config.max_concurrent_jobs;
        let avg = if state.processing_times.is_empty() {
            0.0
        } else {
            state.processing_times.iter().sum::<i64>() as f64 / state.processing_times.len() as f64
        };
        QueueStats {
            total_submitted: state.total_submitted,
            pending_count: state.pending.len(),
            processing_count: state.processing.len(),
            completed_count: state.completed_count,
            failed_count: state.failed_count,
            cancelled_count: state.cancelled_count,
            max_concurrent_jobs: max,
            peak_processing: state.peak_processing,
            utilization: if max == 0 { 0.0 } else { state.processing.len() as f64 / max as f64 },
            avg_processing_ms: avg,
        }
    }

    /// Start pending jobs while worker slots are free.
    fn dispatch(self: &Arc<Self>) {
        let mut started = Vec::new();
        {
            let mut state = self.lock();
            if state.shutdown {
                return;
            }
            while state.processing.len() < self.config.max_concurrent_jobs {
                let Some(job_id) = state.pending.pop_front() else {
                    break;
                };
                let Some(job) = state.jobs.get_mut(&job_id) else {
                    continue;
                };
                if job.status != JobStatus::Pending {
                    continue;
                }
                job.mark_processing();
                let snapshot = job.clone();
                self.persist(&snapshot);
                let token = CancellationToken::new();
                state.processing.insert(job_id, token.clone());
                state.peak_processing = state.peak_processing.max(state.processing.len());
                started.push((snapshot, token));
            }
        }

        for (job, token) in started {
            log::info!("Starting voice clone job {}", job.id);
            emit_event(self.emitter.as_ref(), channels::JOB_STARTED, &JobStatusEvent::from_job(&job));

            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let job_id = job.id.clone();
                let worker = Arc::clone(&inner);
                let handle = tokio::spawn(async move {
                    let sink = JobSink { inner: worker.as_ref(), job_id: &job.id };
                    worker.executor.run(&job, &token, &sink).await
                });
                let outcome = handle.await.unwrap_or_else(|e| {
                    log::error!("Worker for job {} aborted: {}", job_id, e);
                    JobOutcome::Failed(JobError::new(
                        ErrorKind::ProviderError,
                        format!("Worker task aborted: {}", e),
                    ))
                });
                inner.finish(&job_id, outcome);
                inner.dispatch();
            });
        }
    }

    /// Apply a worker's outcome and release its slot.
    fn finish(&self, job_id: &str, outcome: JobOutcome) {
        let (finished, now_idle) = {
            let mut state = self.lock();
            state.processing.remove(job_id);
            let now_idle = state.processing.is_empty();

            let finished = state
                .jobs
                .get_mut(job_id)
                .filter(|job| job.status == JobStatus::Processing)
                .map(|job| {
                    match outcome {
                        JobOutcome::Completed { output_path, output_size } => {
                            job.mark_completed(output_path, output_size)
                        }
                        JobOutcome::Failed(error) => job.mark_failed(error),
                        JobOutcome::Cancelled => job.mark_cancelled(),
                    }
                    job.clone()
                });
            if let Some(job) = &finished {
                state.record_terminal(job);
                self.persist(job);
            }
            (finished, now_idle)
        };

        if let Some(job) = finished {
            log::info!("Voice clone job {} finished: {}", job.id, job.status);
            self.announce_terminal(job);
        }
        // Terminal saves are queued before shutdown's flush
        if now_idle {
            self.idle.notify_waiters();
        }
    }

    /// Emit and notify a terminal transition. The caller has already queued
    /// its save.
    fn announce_terminal(&self, job: Job) {
        let event = JobStatusEvent::from_job(&job);
        emit_event(self.emitter.as_ref(), event.channel(), &event);
        emit_event(
            self.emitter.as_ref(),
            channels::QUEUE_STATS,
            &QueueStatsEvent { stats: self.stats() },
        );

        if job.notify.is_empty() {
            return;
        }
        let notifier = Arc::clone(&self.notifier);
        let notification = JobNotification::from_job(&job);
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&notification).await {
                log::error!("Notification for job {} failed: {}", notification.job_id, e);
            }
        });
    }
}

/// Routes executor progress into the job record.
struct JobSink<'a> {
    inner: &'a QueueInner,
    job_id: &'a str,
}

impl JobSink<'_> {
    /// Apply `apply` to a processing job and queue its save under the same lock.
    fn update(&self, apply: impl FnOnce(&mut Job)) -> Option<Job> {
        let mut state = self.inner.lock();
        let job = state.jobs.get_mut(self.job_id)?;
        if job.status != JobStatus::Processing {
            return None;
        }
        apply(job);
        self.inner.persist(job);
        Some(job.clone())
    }
}

impl ProgressSink for JobSink<'_> {
    fn progress(&self, progress: u8, stage: &str) {
        if let Some(job) = self.update(|job| job.update_progress(progress, stage)) {
            emit_event(
                self.inner.emitter.as_ref(),
                channels::JOB_PROGRESS,
                &JobStatusEvent::from_job(&job),
            );
        }
    }

    fn voice_created(&self, voice_id: &str) {
        self.update(|job| job.voice_id = Some(voice_id.to_string()));
    }

    fn planned(&self, chunk_count: usize) {
        self.update(|job| job.chunk_count = Some(chunk_count));
    }
}
