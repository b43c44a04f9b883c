//! Mock implementations for testing
//!
//! [`FakeSynthesisClient`] models a provider account with a finite number of
//! voice slots. Behaviour can be scripted per test (refused creations, failing
//! chunks, slow or gated synthesis) and every call is counted.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Semaphore;

use crate::core::voice::providers::SynthesisClient;
use crate::core::voice::types::{NewVoice, Result, VoiceError, VoiceSettings, VoiceSlot};

/// Fixed reference time so voice ages are deterministic
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// `count` voices, `v0` oldest, all with the given managed flag
pub fn voices(count: usize, managed: bool) -> Vec<VoiceSlot> {
    (0..count)
        .map(|i| {
            VoiceSlot::new(
                &format!("v{}", i),
                &format!("Voice {}", i),
                base_time() + chrono::Duration::minutes(i as i64),
                managed,
            )
        })
        .collect()
}

// ============================================================================
// Fake Synthesis Client
// ============================================================================

struct FakeState {
    voices: Vec<VoiceSlot>,
    limit: usize,
    create_errors: VecDeque<VoiceError>,
    failing_deletes: HashSet<String>,
    next_voice: usize,
}

pub struct FakeSynthesisClient {
    state: Mutex<FakeState>,
    fail_synthesis_on_call: Option<u32>,
    synth_delay: Duration,
    gate: Option<Semaphore>,

    pub create_calls: AtomicU32,
    pub synth_calls: AtomicU32,
    pub delete_calls: AtomicU32,
    pub deleted: Mutex<Vec<String>>,
    pub synthesized: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeSynthesisClient {
    pub fn new(limit: usize) -> Self {
        Self {
            state: Mutex::new(FakeState {
                voices: Vec::new(),
                limit,
                create_errors: VecDeque::new(),
                failing_deletes: HashSet::new(),
                next_voice: 0,
            }),
            fail_synthesis_on_call: None,
            synth_delay: Duration::ZERO,
            gate: None,
            create_calls: AtomicU32::new(0),
            synth_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
            deleted: Mutex::new(Vec::new()),
            synthesized: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_voices(self, voices: Vec<VoiceSlot>) -> Self {
        self.state.lock().unwrap().voices = voices;
        self
    }

    /// Errors returned by the next `create_voice` calls, in order
    pub fn with_create_errors(self, errors: Vec<VoiceError>) -> Self {
        self.state.lock().unwrap().create_errors = errors.into();
        self
    }

    pub fn with_failing_delete(self, voice_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_deletes
            .insert(voice_id.to_string());
        self
    }

    /// Fail the n-th (1-based) synthesize call with a provider error
    pub fn fail_synthesis_on_call(mut self, call: u32) -> Self {
        self.fail_synthesis_on_call = Some(call);
        self
    }

    pub fn with_synth_delay(mut self, delay: Duration) -> Self {
        self.synth_delay = delay;
        self
    }

    /// Block every synthesize call until [`release`](Self::release) is called
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn voice_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .voices
            .iter()
            .map(|v| v.voice_id.clone())
            .collect()
    }
}

#[async_trait]
impl SynthesisClient for FakeSynthesisClient {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn create_voice(&self, voice: NewVoice<'_>) -> Result<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        if let Some(err) = state.create_errors.pop_front() {
            return Err(err);
        }
        if state.voices.len() >= state.limit {
            return Err(VoiceError::LimitReached("voice_limit_reached".to_string()));
        }

        let voice_id = format!("clone_{}", state.next_voice);
        let created_at = base_time() + chrono::Duration::days(1 + state.next_voice as i64);
        state.next_voice += 1;
        state
            .voices
            .push(VoiceSlot::new(&voice_id, voice.name, created_at, true));
        Ok(voice_id)
    }

    async fn synthesize(
        &self,
        voice_id: &str,
        text: &str,
        _model_id: &str,
        _settings: &VoiceSettings,
    ) -> Result<Vec<u8>> {
        let call = self.synth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if !self.synth_delay.is_zero() {
            tokio::time::sleep(self.synth_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_synthesis_on_call == Some(call) {
            return Err(VoiceError::ProviderError("HTTP 500: upstream failure".to_string()));
        }
        self.synthesized
            .lock()
            .unwrap()
            .push((voice_id.to_string(), text.to_string()));
        Ok(format!("[{}]", text).into_bytes())
    }

    async fn delete_voice(&self, voice_id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        if state.failing_deletes.contains(voice_id) {
            return Err(VoiceError::ProviderError("HTTP 503".to_string()));
        }
        let before = state.voices.len();
        state.voices.retain(|v| v.voice_id != voice_id);
        if state.voices.len() == before {
            return Err(VoiceError::NotFound(voice_id.to_string()));
        }
        self.deleted.lock().unwrap().push(voice_id.to_string());
        Ok(())
    }

    async fn list_voices(&self) -> Result<Vec<VoiceSlot>> {
        let mut voices = self.state.lock().unwrap().voices.clone();
        voices.sort_by_key(|v| v.created_at);
        Ok(voices)
    }

    async fn voice_limit(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().limit)
    }
}
