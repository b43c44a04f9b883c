use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::core::voice::providers::SynthesisClient;
use crate::core::voice::types::{
    ElevenLabsConfig, NewVoice, Result, VoiceError, VoiceSettings, VoiceSlot,
};

/// Label key used to recognise voices created by this service.
const MANAGED_LABEL_KEY: &str = "managed_by";

pub struct ElevenLabsClient {
    client: Client,
    config: ElevenLabsConfig,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceEntry>,
}

#[derive(Debug, Deserialize)]
struct VoiceEntry {
    voice_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    labels: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    created_at_unix: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AddVoiceResponse {
    voice_id: String,
}

/// Status + message extracted from an error response body.
struct ApiFailure {
    code: StatusCode,
    status: Option<String>,
    message: String,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            log::warn!("ElevenLabs API key is empty; provider calls will be rejected");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn is_managed(&self, labels: Option<&serde_json::Map<String, serde_json::Value>>) -> bool {
        match labels.and_then(|l| l.get(MANAGED_LABEL_KEY)).and_then(|v| v.as_str()) {
            Some(owner) => owner == self.config.managed_label,
            None => self.config.adopt_unlabeled_voices,
        }
    }

    async fn failure(response: Response) -> ApiFailure {
        let code = response.status();
        let text = response.text().await.unwrap_or_default();

        let detail = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .and_then(|v| v.get("detail").cloned());

        let (status, message) = match detail {
            Some(serde_json::Value::Object(obj)) => (
                obj.get("status").and_then(|s| s.as_str()).map(String::from),
                obj.get("message")
                    .and_then(|m| m.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| text.clone()),
            ),
            Some(serde_json::Value::String(s)) => (None, s),
            Some(other) => (None, other.to_string()),
            None => (None, text.chars().take(200).collect()),
        };

        ApiFailure { code, status, message }
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("mp3") => "audio/mpeg",
            Some("wav") => "audio/wav",
            _ => "application/octet-stream",
        }
    }
}

#[async_trait]
impl SynthesisClient for ElevenLabsClient {
    fn id(&self) -> &'static str {
        "elevenlabs"
    }

    async fn create_voice(&self, voice: NewVoice<'_>) -> Result<String> {
        if voice.samples.is_empty() {
            return Err(VoiceError::InvalidAudio("No audio samples provided".to_string()));
        }

        let description = voice.description.map(String::from).unwrap_or_else(|| {
            format!("Voice clone created from {} audio files", voice.samples.len())
        });
        let labels = json!({ MANAGED_LABEL_KEY: self.config.managed_label });

        let mut form = Form::new()
            .text("name", voice.name.to_string())
            .text("description", description)
            .text("labels", labels.to_string())
            .text("remove_background_noise", "true");

        let mut total_bytes = 0usize;
        for sample in voice.samples {
            let data = tokio::fs::read(sample).await.map_err(|e| {
                VoiceError::InvalidAudio(format!(
                    "Cannot read audio sample {}: {}",
                    sample.display(),
                    e
                ))
            })?;
            total_bytes += data.len();

            let file_name = sample
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("sample")
                .to_string();
            let part = Part::bytes(data)
                .file_name(file_name)
                .mime_str(Self::content_type(sample))?;
            form = form.part("files", part);
        }

        log::info!(
            "Uploading {} samples ({} bytes) for voice clone '{}'",
            voice.samples.len(),
            total_bytes,
            voice.name
        );

        let response = self
            .client
            .post(self.url("voices/add"))
            .header("xi-api-key", &self.config.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let failure = Self::failure(response).await;
            let status = failure.status.as_deref().unwrap_or_default();
            let lowered = failure.message.to_lowercase();

            return Err(if status.contains("voice_limit") {
                VoiceError::LimitReached(failure.message)
            } else if status == "quota_exceeded" {
                VoiceError::ProviderError(format!("API quota exceeded: {}", failure.message))
            } else if lowered.contains("audio") || lowered.contains("quality") {
                VoiceError::InvalidAudio(failure.message)
            } else if matches!(
                failure.code,
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
            ) {
                VoiceError::InvalidAudio(format!("HTTP {}: {}", failure.code, failure.message))
            } else {
                VoiceError::ProviderError(format!("HTTP {}: {}", failure.code, failure.message))
            });
        }

        let body: AddVoiceResponse = response.json().await?;
        log::info!("Created voice clone '{}' ({})", voice.name, body.voice_id);
        Ok(body.voice_id)
    }

    async fn synthesize(
        &self,
        voice_id: &str,
        text: &str,
        model_id: &str,
        settings: &VoiceSettings,
    ) -> Result<Vec<u8>> {
        let body = json!({
            "text": text,
            "model_id": model_id,
            "voice_settings": {
                "stability": settings.stability,
                "similarity_boost": settings.similarity_boost,
                "style": settings.style,
                "use_speaker_boost": settings.use_speaker_boost
            }
        });

        let response = self
            .client
            .post(self.url(&format!("text-to-speech/{}", voice_id)))
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let failure = Self::failure(response).await;
            return Err(match failure.code {
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    VoiceError::InvalidParameter(failure.message)
                }
                code => VoiceError::ProviderError(format!("HTTP {}: {}", code, failure.message)),
            });
        }

        let audio = response.bytes().await?.to_vec();
        log::debug!("Synthesized {} chars into {} bytes", text.chars().count(), audio.len());
        Ok(audio)
    }

    async fn delete_voice(&self, voice_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("voices/{}", voice_id)))
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await?;

        if response.status().is_success() {
            log::info!("Deleted voice {}", voice_id);
            return Ok(());
        }

        let failure = Self::failure(response).await;
        let missing = failure.code == StatusCode::NOT_FOUND
            || matches!(
                failure.status.as_deref(),
                Some("voice_not_found") | Some("voice_does_not_exist")
            );
        if missing {
            Err(VoiceError::NotFound(format!("Voice {}", voice_id)))
        } else {
            Err(VoiceError::ProviderError(format!(
                "Failed to delete voice {} (HTTP {}): {}",
                voice_id, failure.code, failure.message
            )))
        }
    }

    async fn list_voices(&self) -> Result<Vec<VoiceSlot>> {
        let response = self
            .client
            .get(self.url("voices"))
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let failure = Self::failure(response).await;
            return Err(VoiceError::ProviderError(format!(
                "Failed to list voices (HTTP {}): {}",
                failure.code, failure.message
            )));
        }

        let data: VoicesResponse = response.json().await?;

        let mut slots: Vec<VoiceSlot> = data
            .voices
            .into_iter()
            .filter(|v| v.category.as_deref() != Some("premade"))
            .map(|v| {
                let created_at = v
                    .created_at_unix
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                let managed = self.is_managed(v.labels.as_ref());
                VoiceSlot::new(&v.voice_id, &v.name, created_at, managed)
            })
            .collect();
        slots.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.voice_id.cmp(&b.voice_id))
        });

        log::debug!("Retrieved {} slot-occupying voices", slots.len());
        Ok(slots)
    }

    async fn voice_limit(&self) -> Result<usize> {
        let response = self
            .client
            .get(self.url("user/subscription"))
            .header("xi-api-key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            log::warn!(
                "Subscription lookup failed (HTTP {}); assuming voice limit {}",
                response.status(),
                self.config.fallback_voice_limit
            );
            return Ok(self.config.fallback_voice_limit);
        }

        let data: serde_json::Value = response.json().await?;
        Ok(data["voice_limit"]
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or(self.config.fallback_voice_limit))
    }
}
