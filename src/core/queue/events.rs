//! Events for the voice clone queue.

use serde::Serialize;

use super::types::{Job, JobError, JobStatus, QueueStats};

// ============================================================================
// Queue Event Emitter Trait
// ============================================================================

/// Sink for queue lifecycle events.
///
/// Implementations can forward events to a UI, log them, or ignore them.
pub trait QueueEventEmitter: Send + Sync {
    fn emit_json(&self, channel: &str, payload: serde_json::Value);
}

/// Helper to emit typed events through the trait
pub fn emit_event(emitter: &dyn QueueEventEmitter, channel: &str, payload: &impl Serialize) {
    match serde_json::to_value(payload) {
        Ok(value) => emitter.emit_json(channel, value),
        Err(e) => log::warn!("Failed to serialize {} event: {}", channel, e),
    }
}

/// A no-op emitter that discards all events
pub struct NoopEmitter;

impl QueueEventEmitter for NoopEmitter {
    fn emit_json(&self, _channel: &str, _payload: serde_json::Value) {}
}

/// Writes every event to the debug log.
pub struct LogEmitter;

impl QueueEventEmitter for LogEmitter {
    fn emit_json(&self, channel: &str, payload: serde_json::Value) {
        log::debug!("[{}] {}", channel, payload);
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Event emitted when a job is submitted
#[derive(Debug, Clone, Serialize)]
pub struct JobSubmittedEvent {
    pub job_id: String,
    pub voice_name: String,
    pub model_id: String,
    pub char_count: usize,
    pub sample_count: usize,
}

impl JobSubmittedEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            voice_name: job.voice_name.clone(),
            model_id: job.model_id.clone(),
            char_count: job.text.chars().count(),
            sample_count: job.audio_files.len(),
        }
    }
}

/// Event emitted when job status or progress changes
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub stage: String,
    pub output_path: Option<String>,
    pub error: Option<JobError>,
}

impl JobStatusEvent {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            stage: job.stage.clone(),
            output_path: job.output_path.as_ref().map(|p| p.display().to_string()),
            error: job.error.clone(),
        }
    }

    /// Channel matching the job's current status
    pub fn channel(&self) -> &'static str {
        match self.status {
            JobStatus::Pending => channels::JOB_SUBMITTED,
            JobStatus::Processing => channels::JOB_PROGRESS,
            JobStatus::Completed => channels::JOB_COMPLETED,
            JobStatus::Failed => channels::JOB_FAILED,
            JobStatus::Cancelled => channels::JOB_CANCELLED,
        }
    }
}

/// Event emitted for queue statistics updates
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatsEvent {
    pub stats: QueueStats,
}

/// Event channel names
pub mod channels {
    pub const JOB_SUBMITTED: &str = "voice-clone:job-submitted";
    pub const JOB_STARTED: &str = "voice-clone:job-started";
    pub const JOB_PROGRESS: &str = "voice-clone:job-progress";
    pub const JOB_COMPLETED: &str = "voice-clone:job-completed";
    pub const JOB_FAILED: &str = "voice-clone:job-failed";
    pub const JOB_CANCELLED: &str = "voice-clone:job-cancelled";
    pub const QUEUE_STATS: &str = "voice-clone:queue-stats";
}
