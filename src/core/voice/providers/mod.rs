use async_trait::async_trait;

use super::types::{NewVoice, Result, VoiceSettings, VoiceSlot};

pub mod elevenlabs;

pub use elevenlabs::ElevenLabsClient;

/// Operations the job pipeline needs from a voice-cloning provider.
///
/// Implementations classify failures with the [`VoiceError`](super::VoiceError)
/// variants: `LimitReached`, `InvalidAudio`, `InvalidParameter`, `NotFound`
/// and `ProviderError`.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Unique identifier for the provider (e.g., "elevenlabs")
    fn id(&self) -> &'static str;

    /// Clone a voice from audio samples, returning the provider voice id
    async fn create_voice(&self, voice: NewVoice<'_>) -> Result<String>;

    /// Synthesize one chunk of text with an existing voice
    async fn synthesize(
        &self,
        voice_id: &str,
        text: &str,
        model_id: &str,
        settings: &VoiceSettings,
    ) -> Result<Vec<u8>>;

    /// Delete a voice; `NotFound` when it no longer exists
    async fn delete_voice(&self, voice_id: &str) -> Result<()>;

    /// Voices occupying a slot, oldest first
    async fn list_voices(&self) -> Result<Vec<VoiceSlot>>;

    /// Account-wide voice slot limit
    async fn voice_limit(&self) -> Result<usize>;
}
