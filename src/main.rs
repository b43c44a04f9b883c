use std::sync::Arc;
use std::time::Duration;

use voxclone::config::AppConfig;
use voxclone::core::artifacts::LocalArtifactStore;
use voxclone::core::notify::NotificationDispatcher;
use voxclone::core::queue::events::LogEmitter;
use voxclone::core::queue::{InMemoryRepository, JobRepository, JsonFileRepository, QueueManager};
use voxclone::core::voice::{ElevenLabsClient, SynthesisClient};
use voxclone::server::{self, AppState};

const RETENTION_INTERVAL: Duration = Duration::from_secs(60 * 60);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().any(|a| a == "--print-default-config") {
        print!("{}", AppConfig::default().to_toml_string()?);
        return Ok(());
    }

    let config = AppConfig::load()?;
    let _log_guard = voxclone::core::logging::init(&config.logging);
    log::info!("{} v{} starting", voxclone::NAME, voxclone::VERSION);

    let client: Arc<dyn SynthesisClient> = Arc::new(ElevenLabsClient::new(config.provider.clone())?);
    let store = Arc::new(LocalArtifactStore::new(config.storage.clone())?);
    let notifier = Arc::new(NotificationDispatcher::from_config(&config.notifications)?);
    let repository: Arc<dyn JobRepository> = if config.queue.persist_jobs {
        log::info!("Persisting jobs to {}", config.queue.state_dir.display());
        Arc::new(JsonFileRepository::new(&config.queue.state_dir)?)
    } else {
        Arc::new(InMemoryRepository::new())
    };

    let queue = QueueManager::builder(config.queue.clone(), Arc::clone(&client), store.clone())
        .with_models(config.models.clone())
        .with_repository(repository)
        .with_notifier(notifier)
        .with_emitter(Arc::new(LogEmitter))
        .build();
    queue.restore().await?;

    let retention = tokio::spawn(run_retention(
        queue.clone(),
        store.clone(),
        Duration::from_secs(config.queue.job_retention_hours * 3600),
        Duration::from_secs(config.storage.file_retention_hours * 3600),
    ));

    let state = Arc::new(AppState::new(queue.clone(), store, client, config.server.clone()));
    let served = server::serve(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
        }
        log::info!("Shutdown signal received");
    })
    .await;

    retention.abort();
    queue.shutdown(SHUTDOWN_GRACE).await;
    log::info!("voxclone stopped");

    served?;
    Ok(())
}

/// Periodically drop expired jobs and stale files.
async fn run_retention(
    queue: QueueManager,
    store: Arc<LocalArtifactStore>,
    job_max_age: Duration,
    file_max_age: Duration,
) {
    let mut interval = tokio::time::interval(RETENTION_INTERVAL);
    loop {
        interval.tick().await;
        let jobs = queue.cleanup_old_jobs(job_max_age);
        let files = store.cleanup_old_files(file_max_age).await;
        log::debug!(
            "Retention pass: {} job(s), {} temp dir(s), {} output file(s) removed, {} error(s)",
            jobs,
            files.temp_dirs_deleted,
            files.output_files_deleted,
            files.errors
        );
    }
}
