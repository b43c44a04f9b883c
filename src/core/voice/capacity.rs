//! Voice slot capacity management
//!
//! The provider caps how many cloned voices an account may hold. Before a new
//! voice is created the manager evicts the oldest voices this service created,
//! and retries creation a bounded number of times when the provider still
//! reports the limit (the occupancy view is not transactional).

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::providers::SynthesisClient;
use super::types::{NewVoice, Result, VoiceError, VoiceSlot};

/// Default number of admission attempts
pub const MAX_VOICE_RETRIES: u32 = 3;

// ============================================================================
// Eviction Planning
// ============================================================================

/// Decide which voices to delete so that `slots_needed` new voices fit.
///
/// Only managed voices are candidates, oldest first. Fails with
/// `CapacityExhausted` when managed voices cannot free enough slots.
pub fn plan_eviction(
    voices: &[VoiceSlot],
    current_count: usize,
    limit: usize,
    slots_needed: usize,
) -> Result<Vec<String>> {
    let required = current_count + slots_needed;
    if required <= limit {
        return Ok(Vec::new());
    }
    let to_free = required - limit;

    let mut candidates: Vec<&VoiceSlot> = voices.iter().filter(|v| v.managed).collect();
    candidates.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.voice_id.cmp(&b.voice_id))
    });

    if candidates.len() < to_free {
        return Err(VoiceError::CapacityExhausted(format!(
            "Need {} free slot(s) but only {} managed voice(s) can be evicted ({}/{} in use)",
            to_free,
            candidates.len(),
            current_count,
            limit
        )));
    }

    Ok(candidates
        .into_iter()
        .take(to_free)
        .map(|v| v.voice_id.clone())
        .collect())
}

// ============================================================================
// Cleanup
// ============================================================================

/// Operator-triggered cleanup of managed voices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// Keep only the newest `keep` managed voices
    Oldest { keep: usize },
    /// Delete every managed voice
    All,
    /// Delete the listed voices if they are managed
    Specific { voice_ids: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
    /// Managed voices left after cleanup
    pub remaining: usize,
}

// ============================================================================
// Capacity Manager
// ============================================================================

pub struct VoiceCapacityManager {
    client: Arc<dyn SynthesisClient>,
    max_retries: u32,
}

impl VoiceCapacityManager {
    pub fn new(client: Arc<dyn SynthesisClient>, max_retries: u32) -> Self {
        Self {
            client,
            max_retries: max_retries.max(1),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Secure a slot and create the voice, returning its provider id.
    pub async fn admit(&self, voice: NewVoice<'_>) -> Result<String> {
        let mut last_refusal = String::new();

        for attempt in 1..=self.max_retries {
            let voices = self.client.list_voices().await?;
            let limit = self.client.voice_limit().await?;
            let plan = plan_eviction(&voices, voices.len(), limit, attempt as usize)?;

            if !plan.is_empty() {
                log::info!(
                    "Attempt {}/{}: evicting {} voice(s) ({}/{} slots in use)",
                    attempt,
                    self.max_retries,
                    plan.len(),
                    voices.len(),
                    limit
                );
                self.delete_best_effort(&plan).await;
            }

            match self.client.create_voice(voice.clone()).await {
                Ok(voice_id) => return Ok(voice_id),
                Err(VoiceError::LimitReached(msg)) => {
                    log::warn!(
                        "Provider refused voice '{}' on attempt {}/{}: {}",
                        voice.name,
                        attempt,
                        self.max_retries,
                        msg
                    );
                    last_refusal = msg;
                }
                Err(e) => return Err(e),
            }
        }

        Err(VoiceError::CapacityExhausted(format!(
            "Voice limit still reached after {} attempts: {}",
            self.max_retries, last_refusal
        )))
    }

    /// Delete managed voices according to `policy`.
    pub async fn cleanup(&self, policy: &CleanupPolicy) -> Result<CleanupReport> {
        let managed: Vec<VoiceSlot> = self
            .client
            .list_voices()
            .await?
            .into_iter()
            .filter(|v| v.managed)
            .collect();

        let targets: Vec<String> = match policy {
            CleanupPolicy::Oldest { keep } => {
                let excess = managed.len().saturating_sub(*keep);
                managed.iter().take(excess).map(|v| v.voice_id.clone()).collect()
            }
            CleanupPolicy::All => managed.iter().map(|v| v.voice_id.clone()).collect(),
            CleanupPolicy::Specific { voice_ids } => {
                let owned: HashSet<&str> = managed.iter().map(|v| v.voice_id.as_str()).collect();
                let mut seen = HashSet::new();
                voice_ids
                    .iter()
                    .filter(|id| seen.insert(id.as_str()))
                    .filter(|id| {
                        let ok = owned.contains(id.as_str());
                        if !ok {
                            log::warn!("Skipping cleanup of unmanaged or unknown voice {}", id);
                        }
                        ok
                    })
                    .cloned()
                    .collect()
            }
        };

        let deleted = self.delete_best_effort(&targets).await;
        let failed = targets
            .iter()
            .filter(|id| !deleted.contains(*id))
            .cloned()
            .collect();

        Ok(CleanupReport {
            remaining: managed.len().saturating_sub(deleted.len()),
            deleted,
            failed,
        })
    }

    /// Delete each voice, returning the ids whose slots are now free.
    async fn delete_best_effort(&self, voice_ids: &[String]) -> Vec<String> {
        let mut freed = Vec::with_capacity(voice_ids.len());
        for voice_id in voice_ids {
            match self.client.delete_voice(voice_id).await {
                Ok(()) => freed.push(voice_id.clone()),
                Err(VoiceError::NotFound(_)) => {
                    log::debug!("Voice {} already gone", voice_id);
                    freed.push(voice_id.clone());
                }
                Err(e) => log::warn!("Failed to delete voice {}: {}", voice_id, e),
            }
        }
        freed
    }
}
