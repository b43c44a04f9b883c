//! Logging setup
//!
//! Code logs through the `log` facade; a tracing subscriber collects it:
//! - stdout, pretty for terminals or JSON for log shippers
//! - optional daily-rolling JSON file under `log_dir`
//!
//! `RUST_LOG` overrides the configured level.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

const LOG_FILE_PREFIX: &str = "voxclone.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `voxclone=debug,info`
    pub level: String,
    /// Directory for the rolling JSON log; no file logging when unset
    pub log_dir: Option<PathBuf>,
    /// Emit JSON instead of pretty output on stdout
    pub json_stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            json_stdout: false,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns the file writer guard when file logging is enabled; keep it alive
/// until shutdown so buffered lines are flushed. Calling this twice is a no-op.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if let Some(dir) = &config.log_dir {
        match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .json()
                        .with_file(true)
                        .with_line_number(true)
                        .with_thread_ids(true)
                        .with_target(true)
                        .with_filter(env_filter(&config.level))
                        .boxed(),
                );
                guard = Some(file_guard);
            }
            Err(e) => eprintln!("Failed to create log directory {}: {}", dir.display(), e),
        }
    }

    let stdout = if config.json_stdout {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .json()
            .with_target(true)
            .with_filter(env_filter(&config.level))
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .pretty()
            .with_filter(env_filter(&config.level))
            .boxed()
    };
    layers.push(stdout);

    if tracing_subscriber::registry().with(layers).try_init().is_err() {
        return None;
    }
    // No-op when the subscriber already bridged `log` records
    let _ = tracing_log::LogTracer::init();

    match &config.log_dir {
        Some(dir) => log::info!(
            "Logging initialized at level '{}', writing to {:?} (daily rolling)",
            config.level,
            dir.join(LOG_FILE_PREFIX)
        ),
        None => log::info!("Logging initialized at level '{}'", config.level),
    }
    guard
}
