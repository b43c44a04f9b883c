//! Artifact storage
//!
//! Persists synthesized audio and manages the temporary upload area the HTTP
//! layer writes audio samples into.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::voice::types::{Result, VoiceError};

/// Characters replaced when building file names
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const MAX_FILENAME_CHARS: usize = 50;
const FALLBACK_FILENAME: &str = "voice_clone";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// Lowercase extensions including the dot
    pub allowed_extensions: Vec<String>,
    pub max_file_size_bytes: u64,
    pub min_file_size_bytes: u64,
    /// Age after which temporary uploads are removed; outputs live 24x longer
    pub file_retention_hours: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            temp_dir: std::env::temp_dir().join("voxclone_uploads"),
            allowed_extensions: vec![".wav".to_string(), ".mp3".to_string()],
            max_file_size_bytes: 50 * 1024 * 1024,
            min_file_size_bytes: 1024,
            file_retention_hours: 24,
        }
    }
}

// ============================================================================
// Artifact Store Trait
// ============================================================================

/// File collaborator used by the job executor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist the final artifact, returning where it was written
    async fn save(&self, audio: &[u8], suggested_name: &str) -> Result<PathBuf>;

    /// Remove temporary files; failures are logged, never returned
    async fn cleanup_temporary(&self, paths: &[PathBuf]);
}

// ============================================================================
// Local Filesystem Store
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub temp_dirs_deleted: usize,
    pub output_files_deleted: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectoryStats {
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_files: usize,
    pub output_bytes: u64,
    pub temp_dirs: usize,
    pub temp_bytes: u64,
}

pub struct LocalArtifactStore {
    config: StorageConfig,
}

impl LocalArtifactStore {
    /// Create the store and its directories.
    pub fn new(config: StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir)?;
        std::fs::create_dir_all(&config.temp_dir)?;
        log::info!(
            "Artifact store ready: output={}, temp={}",
            config.output_dir.display(),
            config.temp_dir.display()
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Check an upload's extension and size against the configured policy.
    pub fn validate_upload(&self, file_name: &str, size: u64) -> Result<()> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();

        if !self.config.allowed_extensions.iter().any(|a| a == &extension) {
            return Err(VoiceError::InvalidAudio(format!(
                "Invalid file format for {}: allowed {}",
                file_name,
                self.config.allowed_extensions.join(", ")
            )));
        }
        if size > self.config.max_file_size_bytes {
            return Err(VoiceError::InvalidAudio(format!(
                "File too large: {} ({} bytes > {} bytes)",
                file_name, size, self.config.max_file_size_bytes
            )));
        }
        if size < self.config.min_file_size_bytes {
            return Err(VoiceError::InvalidAudio(format!(
                "File too small: {} ({} bytes)",
                file_name, size
            )));
        }
        Ok(())
    }

    /// Write an uploaded sample into the temp area under `scope`.
    pub async fn save_upload(&self, scope: &str, audio: &[u8], original_name: &str) -> Result<PathBuf> {
        let dir = self.config.temp_dir.join(sanitize_filename(scope));
        tokio::fs::create_dir_all(&dir).await?;

        let extension = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let path = dir.join(format!("{}{}", Uuid::new_v4().simple(), extension));

        tokio::fs::write(&path, audio).await?;
        log::info!("Saved upload {} ({} bytes)", path.display(), audio.len());
        Ok(path)
    }

    /// Remove stale temp directories and very old outputs.
    pub async fn cleanup_old_files(&self, max_age: Duration) -> CleanupStats {
        let mut stats = CleanupStats::default();
        let now = SystemTime::now();

        if let Ok(mut entries) = tokio::fs::read_dir(&self.config.temp_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if !path.is_dir() || !is_older_than(&path, now, max_age).await {
                    continue;
                }
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => stats.temp_dirs_deleted += 1,
                    Err(e) => {
                        log::error!("Failed to delete temp directory {}: {}", path.display(), e);
                        stats.errors += 1;
                    }
                }
            }
        }

        let output_age = max_age * 24;
        if let Ok(mut entries) = tokio::fs::read_dir(&self.config.output_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if !path.is_file() || !is_older_than(&path, now, output_age).await {
                    continue;
                }
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => stats.output_files_deleted += 1,
                    Err(e) => {
                        log::error!("Failed to delete output file {}: {}", path.display(), e);
                        stats.errors += 1;
                    }
                }
            }
        }

        log::info!("File cleanup completed: {:?}", stats);
        stats
    }

    pub async fn directory_stats(&self) -> DirectoryStats {
        let mut stats = DirectoryStats {
            output_dir: self.config.output_dir.clone(),
            temp_dir: self.config.temp_dir.clone(),
            ..Default::default()
        };

        if let Ok(mut entries) = tokio::fs::read_dir(&self.config.output_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if let Ok(meta) = entry.metadata().await {
                    if meta.is_file() {
                        stats.output_files += 1;
                        stats.output_bytes += meta.len();
                    }
                }
            }
        }

        if let Ok(mut entries) = tokio::fs::read_dir(&self.config.temp_dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if !entry.path().is_dir() {
                    continue;
                }
                stats.temp_dirs += 1;
                if let Ok(mut files) = tokio::fs::read_dir(entry.path()).await {
                    while let Ok(Some(file)) = files.next_entry().await {
                        if let Ok(meta) = file.metadata().await {
                            stats.temp_bytes += meta.len();
                        }
                    }
                }
            }
        }

        stats
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn save(&self, audio: &[u8], suggested_name: &str) -> Result<PathBuf> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let file_name = format!("{}_{}.mp3", sanitize_filename(suggested_name), timestamp);
        let path = self.config.output_dir.join(file_name);

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| VoiceError::StorageError(format!("Cannot create output dir: {}", e)))?;
        tokio::fs::write(&path, audio)
            .await
            .map_err(|e| VoiceError::StorageError(format!("Cannot write {}: {}", path.display(), e)))?;

        log::info!("Saved generated audio: {} ({} bytes)", path.display(), audio.len());
        Ok(path)
    }

    async fn cleanup_temporary(&self, paths: &[PathBuf]) {
        let mut parents = Vec::new();
        for path in paths {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove temp file {}: {}", path.display(), e);
                }
            }
            if let Some(parent) = path.parent() {
                if parent.starts_with(&self.config.temp_dir)
                    && parent != self.config.temp_dir.as_path()
                    && !parents.contains(&parent)
                {
                    parents.push(parent);
                }
            }
        }
        // Only empty scope directories go; anything else is left alone.
        for parent in parents {
            let _ = tokio::fs::remove_dir(parent).await;
        }
    }
}

async fn is_older_than(path: &Path, now: SystemTime, max_age: Duration) -> bool {
    match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => now
            .duration_since(modified)
            .map(|age| age > max_age)
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Make `name` safe for use as a file name.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed: String = replaced
        .trim_matches(|c: char| c == ' ' || c == '.')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();

    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed
    }
}
