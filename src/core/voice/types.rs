use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the voice pipeline and the provider client.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Voice limit reached: {0}")]
    LimitReached(String),

    #[error("Voice capacity exhausted: {0}")]
    CapacityExhausted(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl VoiceError {
    /// Classify the error into the job-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidAudio(_) => ErrorKind::InvalidAudio,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::LimitReached(_) => ErrorKind::LimitReached,
            Self::CapacityExhausted(_) => ErrorKind::CapacityExhausted,
            Self::ProviderError(_) | Self::NetworkError(_) => ErrorKind::ProviderError,
            Self::StorageError(_) | Self::IoError(_) => ErrorKind::StorageError,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;

/// Serializable error classification stored on failed jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidAudio,
    InvalidParameter,
    LimitReached,
    CapacityExhausted,
    ProviderError,
    StorageError,
    NotFound,
    /// Job was mid-flight when the service stopped
    Interrupted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidAudio => "invalid_audio",
            Self::InvalidParameter => "invalid_parameter",
            Self::LimitReached => "limit_reached",
            Self::CapacityExhausted => "capacity_exhausted",
            Self::ProviderError => "provider_error",
            Self::StorageError => "storage_error",
            Self::NotFound => "not_found",
            Self::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Slot limit assumed when the subscription endpoint does not report one
    pub fallback_voice_limit: usize,
    /// Label value attached to voices this service creates
    pub managed_label: String,
    /// Treat custom voices without our label as managed (evictable)
    pub adopt_unlabeled_voices: bool,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            request_timeout_secs: 120,
            fallback_voice_limit: 10,
            managed_label: "voxclone".to_string(),
            adopt_unlabeled_voices: false,
        }
    }
}

// ============================================================================
// Voice Settings
// ============================================================================

/// Synthesis settings forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Voice stability (0.0 - 1.0)
    #[serde(default = "default_stability")]
    pub stability: f32,
    /// Similarity boost (0.0 - 1.0)
    #[serde(default = "default_similarity_boost")]
    pub similarity_boost: f32,
    /// Style exaggeration (0.0 - 1.0)
    #[serde(default)]
    pub style: f32,
    #[serde(default = "default_use_speaker_boost")]
    pub use_speaker_boost: bool,
}

fn default_stability() -> f32 { 0.6 }
fn default_similarity_boost() -> f32 { 0.8 }
fn default_use_speaker_boost() -> bool { true }

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: default_stability(),
            similarity_boost: default_similarity_boost(),
            style: 0.0,
            use_speaker_boost: default_use_speaker_boost(),
        }
    }
}

// ============================================================================
// Voice Slots
// ============================================================================

/// One provider-side voice that occupies a slot of the account limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSlot {
    pub voice_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// True when this service created the voice and may evict it
    pub managed: bool,
}

impl VoiceSlot {
    pub fn new(voice_id: &str, name: &str, created_at: DateTime<Utc>, managed: bool) -> Self {
        Self {
            voice_id: voice_id.to_string(),
            name: name.to_string(),
            created_at,
            managed,
        }
    }
}

/// Request to clone a new voice from local audio samples.
#[derive(Debug, Clone)]
pub struct NewVoice<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub samples: &'a [std::path::PathBuf],
}
