//! Synthesis model catalog.
//!
//! Chunk-size limits and stability handling are per model. The table is
//! configuration: defaults mirror the provider's documented limits with a
//! safety margin, and deployments may override or extend it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{Result, VoiceError, VoiceSettings};

/// How a model accepts the `stability` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityMode {
    /// Any value in 0.0 - 1.0
    #[default]
    Continuous,
    /// Only 0.0 (creative), 0.5 (natural) or 1.0 (robust)
    Discrete,
}

/// Per-model synthesis limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Maximum characters per synthesis request
    pub max_chunk_chars: usize,
    #[serde(default)]
    pub stability: StabilityMode,
}

impl ModelSpec {
    pub fn new(max_chunk_chars: usize, stability: StabilityMode) -> Self {
        Self { max_chunk_chars, stability }
    }

    /// Map settings onto values this model accepts.
    pub fn normalize_settings(&self, settings: &VoiceSettings) -> VoiceSettings {
        let mut normalized = settings.clone();
        if self.stability == StabilityMode::Discrete {
            normalized.stability = discrete_stability(settings.stability);
            normalized.similarity_boost = settings.similarity_boost.clamp(0.0, 1.0);
        }
        normalized
    }
}

/// Snap a continuous stability value to the nearest legal discrete level.
pub fn discrete_stability(stability: f32) -> f32 {
    if stability < 0.25 {
        0.0
    } else if stability < 0.75 {
        0.5
    } else {
        1.0
    }
}

/// Model id to [`ModelSpec`] lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelSpec>,
}

impl ModelCatalog {
    pub fn new(models: BTreeMap<String, ModelSpec>) -> Self {
        Self { models }
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelSpec> {
        self.models.get(model_id)
    }

    /// Look up a model, failing with `InvalidInput` for unknown ids.
    pub fn resolve(&self, model_id: &str) -> Result<&ModelSpec> {
        self.get(model_id)
            .ok_or_else(|| VoiceError::InvalidInput(format!("Unknown model: {}", model_id)))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModelSpec)> {
        self.models.iter()
    }

    pub fn insert(&mut self, model_id: &str, spec: ModelSpec) {
        self.models.insert(model_id.to_string(), spec);
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        for id in [
            "eleven_multilingual_v2",
            "eleven_multilingual_v1",
            "eleven_multilingual_sts_v2",
        ] {
            models.insert(id.to_string(), ModelSpec::new(9500, StabilityMode::Continuous));
        }
        for id in [
            "eleven_flash_v2_5",
            "eleven_turbo_v2_5",
            "eleven_turbo_v2",
            "eleven_flash_v2",
            "eleven_english_sts_v2",
            "eleven_monolingual_v1",
        ] {
            models.insert(id.to_string(), ModelSpec::new(4500, StabilityMode::Continuous));
        }
        models.insert("eleven_v3".to_string(), ModelSpec::new(2800, StabilityMode::Discrete));
        Self { models }
    }
}
