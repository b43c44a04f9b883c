//! Voice cloning primitives: provider client, slot capacity, chunk planning
//! and the model catalog.

pub mod capacity;
pub mod chunking;
pub mod models;
pub mod providers;
pub mod types;

pub use capacity::{plan_eviction, CleanupPolicy, CleanupReport, VoiceCapacityManager};
pub use chunking::{Chunk, ChunkPlan};
pub use models::{ModelCatalog, ModelSpec, StabilityMode};
pub use providers::{ElevenLabsClient, SynthesisClient};
pub use types::{
    ElevenLabsConfig, ErrorKind, NewVoice, Result, VoiceError, VoiceSettings, VoiceSlot,
};
