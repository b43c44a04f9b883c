//! Application configuration
//!
//! Layered with figment, later sources winning:
//! 1. Built-in defaults
//! 2. `~/.config/voxclone/config.toml`
//! 3. `./voxclone.toml`, or the file named by `VOXCLONE_CONFIG`
//! 4. `VOXCLONE_*` environment variables, `__` separating sections
//!    (e.g. `VOXCLONE_QUEUE__MAX_CONCURRENT_JOBS=8`)
//! 5. `ELEVENLABS_API_KEY` and `RESEND_API_KEY`

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::artifacts::StorageConfig;
use crate::core::logging::LoggingConfig;
use crate::core::notify::NotificationConfig;
use crate::core::queue::QueueConfig;
use crate::core::voice::{ElevenLabsConfig, ModelCatalog};
use crate::server::ServerConfig;

const CONFIG_FILE: &str = "voxclone.toml";
const CONFIG_PATH_VAR: &str = "VOXCLONE_CONFIG";
const ENV_PREFIX: &str = "VOXCLONE_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub provider: ElevenLabsConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
    pub models: ModelCatalog,
}

impl AppConfig {
    /// Load from every configured source and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        Self::from_figment(Self::figment(explicit.as_deref()))
    }

    /// The layered sources; `path` replaces `./voxclone.toml` when given.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(user) = dirs::config_dir().map(|d| d.join("voxclone").join("config.toml")) {
            figment = figment.merge(Toml::file(user));
        }
        figment = match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment.merge(Toml::file(CONFIG_FILE)),
        };

        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["config"]))
            .merge(
                Env::raw()
                    .only(&["ELEVENLABS_API_KEY"])
                    .map(|_| "provider.api_key".into()),
            )
            .merge(
                Env::raw()
                    .only(&["RESEND_API_KEY"])
                    .map(|_| "notifications.resend_api_key".into()),
            )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "queue.max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        if self.queue.max_voice_retries == 0 {
            return Err(ConfigError::Invalid(
                "queue.max_voice_retries must be at least 1".to_string(),
            ));
        }
        if let Some((id, _)) = self.models.iter().find(|(_, spec)| spec.max_chunk_chars == 0) {
            return Err(ConfigError::Invalid(format!(
                "models.{}.max_chunk_chars must be at least 1",
                id
            )));
        }
        if !self.models.contains(&self.queue.default_model) {
            return Err(ConfigError::Invalid(format!(
                "queue.default_model '{}' is not in the model table",
                self.queue.default_model
            )));
        }
        if self.storage.min_file_size_bytes > self.storage.max_file_size_bytes {
            return Err(ConfigError::Invalid(
                "storage.min_file_size_bytes exceeds storage.max_file_size_bytes".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML, e.g. for `--print-default-config`.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
