//! Voice clone job types and data models.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::notify::NotificationTarget;
use crate::core::voice::types::{ErrorKind, VoiceError, VoiceSettings};

// ============================================================================
// Job Status
// ============================================================================

/// Status of a voice clone job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a worker slot
    #[default]
    Pending,
    /// Cloning or synthesizing
    Processing,
    Completed,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl JobStatus {
    /// Check if job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(QueueError::InvalidInput(format!("Unknown job status: {}", other))),
        }
    }
}

// ============================================================================
// Job Error Detail
// ============================================================================

/// Structured failure detail recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
    /// Zero-based index of the chunk whose synthesis failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            chunk_index: None,
        }
    }

    pub fn at_chunk(mut self, index: usize) -> Self {
        self.chunk_index = Some(index);
        self
    }

    pub fn interrupted() -> Self {
        Self::new(
            ErrorKind::Interrupted,
            "Job was interrupted by a service restart",
        )
    }
}

impl From<&VoiceError> for JobError {
    fn from(err: &VoiceError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.chunk_index {
            Some(index) => write!(f, "{} (chunk {}): {}", self.kind, index, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

// ============================================================================
// Job Submission
// ============================================================================

/// Everything needed to run one clone-then-synthesize job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub voice_name: String,
    pub text: String,
    pub model_id: String,
    /// Audio samples, in upload order
    pub audio_files: Vec<PathBuf>,
    pub description: Option<String>,
    pub settings: Option<VoiceSettings>,
    #[serde(default)]
    pub notify: NotificationTarget,
    #[serde(default)]
    pub delete_voice_on_cancel: bool,
}

impl JobSpec {
    pub fn new(voice_name: &str, text: &str, model_id: &str, audio_files: Vec<PathBuf>) -> Self {
        Self {
            voice_name: voice_name.to_string(),
            text: text.to_string(),
            model_id: model_id.to_string(),
            audio_files,
            description: None,
            settings: None,
            notify: NotificationTarget::default(),
            delete_voice_on_cancel: false,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_settings(mut self, settings: VoiceSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_notification(mut self, target: NotificationTarget) -> Self {
        self.notify = target;
        self
    }

    /// Delete the cloned voice if the job is cancelled mid-flight
    pub fn delete_voice_on_cancel(mut self, delete: bool) -> Self {
        self.delete_voice_on_cancel = delete;
        self
    }
}

// ============================================================================
// Job Record
// ============================================================================

/// A voice clone job as tracked by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Percentage (0 - 100)
    pub progress: u8,
    /// Human-readable description of the current step
    pub stage: String,
    pub voice_name: String,
    pub description: Option<String>,
    pub text: String,
    pub model_id: String,
    pub audio_files: Vec<PathBuf>,
    pub settings: Option<VoiceSettings>,
    #[serde(default)]
    pub notify: NotificationTarget,
    #[serde(default)]
    pub delete_voice_on_cancel: bool,
    /// Provider voice created for this job
    pub voice_id: Option<String>,
    pub chunk_count: Option<usize>,
    pub output_path: Option<PathBuf>,
    pub output_size: Option<u64>,
    pub error: Option<JobError>,
    #[serde(default)]
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: String, spec: JobSpec) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            progress: 0,
            stage: "Queued".to_string(),
            voice_name: spec.voice_name,
            description: spec.description,
            text: spec.text,
            model_id: spec.model_id,
            audio_files: spec.audio_files,
            settings: spec.settings,
            notify: spec.notify,
            delete_voice_on_cancel: spec.delete_voice_on_cancel,
            voice_id: None,
            chunk_count: None,
            output_path: None,
            output_size: None,
            error: None,
            cancel_requested: false,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Generate a fresh job id (`vcj_` + 12 hex chars).
    pub fn generate_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("vcj_{}", &hex[..12])
    }

    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
        self.progress = 0;
        self.stage = "Starting".to_string();
        self.started_at = Some(Utc::now());
        self.touch();
    }

    /// Record progress; ignored unless processing, and never moves backwards.
    pub fn update_progress(&mut self, progress: u8, stage: &str) {
        if self.status != JobStatus::Processing {
            return;
        }
        self.progress = self.progress.max(progress.min(100));
        self.stage = stage.to_string();
        self.touch();
    }

    pub fn mark_completed(&mut self, output_path: PathBuf, output_size: u64) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.stage = "Completed".to_string();
        self.output_path = Some(output_path);
        self.output_size = Some(output_size);
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    pub fn mark_failed(&mut self, error: JobError) {
        self.status = JobStatus::Failed;
        self.stage = "Failed".to_string();
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    pub fn mark_cancelled(&mut self) {
        self.status = JobStatus::Cancelled;
        self.stage = "Cancelled".to_string();
        self.completed_at = Some(Utc::now());
        self.touch();
    }

    /// Processing duration in milliseconds
    pub fn processing_ms(&self) -> Option<i64> {
        self.started_at.map(|start| {
            let end = self.completed_at.unwrap_or_else(Utc::now);
            (end - start).num_milliseconds()
        })
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Queue Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of jobs processing at once
    pub max_concurrent_jobs: usize,
    /// Voice admission attempts before giving up
    pub max_voice_retries: u32,
    /// Maximum pending jobs (0 = unlimited)
    pub max_queue_size: usize,
    pub persist_jobs: bool,
    pub state_dir: PathBuf,
    /// Terminal jobs older than this are dropped by the retention task
    pub job_retention_hours: u64,
    pub default_model: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            max_voice_retries: 3,
            max_queue_size: 0,
            persist_jobs: false,
            state_dir: PathBuf::from("./state/jobs"),
            job_retention_hours: 24,
            default_model: "eleven_multilingual_v2".to_string(),
        }
    }
}

// ============================================================================
// Queue Statistics
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_submitted: u64,
    pub pending_count: usize,
    pub processing_count: usize,
    pub completed_count: u64,
    pub failed_count: u64,
    pub cancelled_count: u64,
    pub max_concurrent_jobs: usize,
    /// Highest number of jobs processing at the same time
    pub peak_processing: usize,
    /// Share of worker slots in use (0.0 - 1.0)
    pub utilization: f64,
    pub avg_processing_ms: f64,
}

// ============================================================================
// Queue Results & Errors
// ============================================================================

/// Result of a successful cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelOutcome {
    /// Job never started and is now cancelled
    Cancelled,
    /// Job is processing; it stops at the next chunk boundary
    CancellationRequested,
}

/// Error type for queue operations
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is already {status}")]
    AlreadyTerminal { job_id: String, status: JobStatus },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Queue is full")]
    QueueFull,

    #[error("Queue is shut down")]
    Shutdown,

    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type QueueResult<T> = Result<T, QueueError>;
