//! Job executor tests with a mocked artifact store

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::core::artifacts::MockArtifactStore;
use crate::core::queue::{Job, JobExecutor, JobOutcome, JobSpec, ProgressSink};
use crate::core::voice::models::{ModelCatalog, ModelSpec, StabilityMode};
use crate::core::voice::types::{ErrorKind, VoiceError};
use crate::tests::mocks::FakeSynthesisClient;

#[derive(Default)]
struct RecordingSink {
    progress: Mutex<Vec<u8>>,
    voice: Mutex<Option<String>>,
    chunks: Mutex<Option<usize>>,
}

impl ProgressSink for RecordingSink {
    fn progress(&self, progress: u8, _stage: &str) {
        self.progress.lock().unwrap().push(progress);
    }

    fn voice_created(&self, voice_id: &str) {
        *self.voice.lock().unwrap() = Some(voice_id.to_string());
    }

    fn planned(&self, chunk_count: usize) {
        *self.chunks.lock().unwrap() = Some(chunk_count);
    }
}

fn executor(client: Arc<FakeSynthesisClient>, store: MockArtifactStore) -> JobExecutor {
    let mut models = ModelCatalog::default();
    models.insert("tiny", ModelSpec::new(10, StabilityMode::Continuous));
    JobExecutor::new(client, Arc::new(models), Arc::new(store), 3)
}

fn job(text: &str) -> Job {
    let samples = vec![PathBuf::from("/tmp/uploads/job/sample.wav")];
    Job::new(Job::generate_id(), JobSpec::new("Narrator", text, "tiny", samples))
}

#[tokio::test]
async fn test_run_stitches_and_saves_in_order() {
    let client = Arc::new(FakeSynthesisClient::new(10));
    let mut store = MockArtifactStore::new();
    store
        .expect_save()
        .withf(|audio, name| audio == &b"[aaaa bbbb.][cccc dddd.]"[..] && name.ends_with("_Narrator"))
        .times(1)
        .returning(|_, _| Ok(PathBuf::from("/out/narrator.mp3")));
    store
        .expect_cleanup_temporary()
        .withf(|paths| paths.len() == 1)
        .times(1)
        .returning(|_| ());

    let sink = RecordingSink::default();
    let outcome = executor(client.clone(), store)
        .run(&job("aaaa bbbb. cccc dddd."), &CancellationToken::new(), &sink)
        .await;

    assert_eq!(
        outcome,
        JobOutcome::Completed {
            output_path: PathBuf::from("/out/narrator.mp3"),
            output_size: 24,
        }
    );
    assert_eq!(sink.voice.lock().unwrap().as_deref(), Some("clone_0"));
    assert_eq!(*sink.chunks.lock().unwrap(), Some(2));

    let progress = sink.progress.lock().unwrap();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&99));
}

#[tokio::test]
async fn test_chunk_failure_never_saves_partial_audio() {
    let client = Arc::new(FakeSynthesisClient::new(10).fail_synthesis_on_call(2));
    let mut store = MockArtifactStore::new();
    store.expect_save().never();
    store.expect_cleanup_temporary().times(1).returning(|_| ());

    let outcome = executor(client.clone(), store)
        .run(
            &job("aaaa bbbb. cccc dddd. eeee ffff."),
            &CancellationToken::new(),
            &RecordingSink::default(),
        )
        .await;

    match outcome {
        JobOutcome::Failed(error) => {
            assert_eq!(error.kind, ErrorKind::ProviderError);
            assert_eq!(error.chunk_index, Some(1));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(client.synth_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_storage_failure_fails_job() {
    let client = Arc::new(FakeSynthesisClient::new(10));
    let mut store = MockArtifactStore::new();
    store
        .expect_save()
        .returning(|_, _| Err(VoiceError::StorageError("disk full".to_string())));
    store.expect_cleanup_temporary().returning(|_| ());

    let sink = RecordingSink::default();
    let outcome = executor(client, store)
        .run(&job("Short text."), &CancellationToken::new(), &sink)
        .await;

    match outcome {
        JobOutcome::Failed(error) => {
            assert_eq!(error.kind, ErrorKind::StorageError);
            assert!(error.message.contains("disk full"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    // A job whose artifact was never written never reports 100%
    assert!(sink.progress.lock().unwrap().iter().all(|p| *p < 100));
}

#[tokio::test]
async fn test_cancelled_before_start_does_no_provider_work() {
    let client = Arc::new(FakeSynthesisClient::new(10));
    let mut store = MockArtifactStore::new();
    store.expect_save().never();
    store.expect_cleanup_temporary().times(1).returning(|_| ());

    let token = CancellationToken::new();
    token.cancel();
    let outcome = executor(client.clone(), store)
        .run(&job("Short text."), &token, &RecordingSink::default())
        .await;

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_model_fails_before_voice_creation() {
    let client = Arc::new(FakeSynthesisClient::new(10));
    let mut store = MockArtifactStore::new();
    store.expect_save().never();
    store.expect_cleanup_temporary().returning(|_| ());

    let mut unknown = job("Short text.");
    unknown.model_id = "eleven_unknown".to_string();
    let outcome = executor(client.clone(), store)
        .run(&unknown, &CancellationToken::new(), &RecordingSink::default())
        .await;

    match outcome {
        JobOutcome::Failed(error) => assert_eq!(error.kind, ErrorKind::InvalidInput),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 0);
}
