//! Voice capacity manager tests
//!
//! Admission and cleanup run against [`FakeSynthesisClient`] so eviction,
//! retries and the managed-voice guard can be observed call by call.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rstest::rstest;

use crate::core::voice::capacity::{CleanupPolicy, VoiceCapacityManager};
use crate::core::voice::types::{NewVoice, VoiceError};
use crate::tests::mocks::{voices, FakeSynthesisClient};

fn manager(client: &Arc<FakeSynthesisClient>, retries: u32) -> VoiceCapacityManager {
    VoiceCapacityManager::new(client.clone(), retries)
}

fn new_voice() -> NewVoice<'static> {
    NewVoice { name: "Narrator", description: None, samples: &[] }
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_admit_with_free_slot_deletes_nothing() {
    let client = Arc::new(FakeSynthesisClient::new(5).with_voices(voices(2, true)));
    let voice_id = manager(&client, 3).admit(new_voice()).await.unwrap();

    assert_eq!(voice_id, "clone_0");
    assert_eq!(client.delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_admit_on_full_account_evicts_oldest_managed() {
    let mut existing = voices(3, true);
    existing[0].managed = false;
    let client = Arc::new(FakeSynthesisClient::new(3).with_voices(existing));

    manager(&client, 3).admit(new_voice()).await.unwrap();

    assert_eq!(*client.deleted.lock().unwrap(), vec!["v1"]);
    assert_eq!(client.voice_ids(), vec!["v0", "v2", "clone_0"]);
}

#[tokio::test]
async fn test_admit_retries_after_provider_refusal() {
    let client = Arc::new(
        FakeSynthesisClient::new(3)
            .with_voices(voices(3, true))
            .with_create_errors(vec![VoiceError::LimitReached("voice_limit_reached".into())]),
    );

    let voice_id = manager(&client, 3).admit(new_voice()).await.unwrap();

    assert_eq!(voice_id, "clone_0");
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 2);
    // Second attempt frees one more slot than the first
    assert_eq!(*client.deleted.lock().unwrap(), vec!["v0", "v1"]);
}

#[tokio::test]
async fn test_admit_gives_up_after_max_attempts() {
    let refusals = (0..5)
        .map(|_| VoiceError::LimitReached("voice_limit_reached".into()))
        .collect();
    let client = Arc::new(FakeSynthesisClient::new(10).with_create_errors(refusals));

    let err = manager(&client, 3).admit(new_voice()).await.unwrap_err();

    assert!(matches!(err, VoiceError::CapacityExhausted(_)));
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_admit_never_touches_unmanaged_voices() {
    let client = Arc::new(FakeSynthesisClient::new(3).with_voices(voices(3, false)));

    let err = manager(&client, 3).admit(new_voice()).await.unwrap_err();

    assert!(matches!(err, VoiceError::CapacityExhausted(_)));
    assert_eq!(client.delete_calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_eviction_is_tolerated() {
    let client = Arc::new(
        FakeSynthesisClient::new(2)
            .with_voices(voices(2, true))
            .with_failing_delete("v0"),
    );

    manager(&client, 3).admit(new_voice()).await.unwrap();

    assert_eq!(*client.deleted.lock().unwrap(), vec!["v1"]);
    assert_eq!(client.voice_ids(), vec!["v0", "clone_0"]);
}

#[tokio::test]
async fn test_non_capacity_errors_propagate_immediately() {
    let client = Arc::new(
        FakeSynthesisClient::new(10)
            .with_create_errors(vec![VoiceError::ProviderError("HTTP 500".into())]),
    );

    let err = manager(&client, 3).admit(new_voice()).await.unwrap_err();

    assert!(matches!(err, VoiceError::ProviderError(_)));
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_zero_retries_clamped_to_one() {
    let client = Arc::new(FakeSynthesisClient::new(1));
    assert_eq!(manager(&client, 0).max_retries(), 1);
}

// ============================================================================
// Cleanup
// ============================================================================

#[rstest]
#[case::keep_newest(CleanupPolicy::Oldest { keep: 1 }, vec!["v1", "v2"], 1)]
#[case::keep_more_than_exist(CleanupPolicy::Oldest { keep: 10 }, vec![], 3)]
#[case::all(CleanupPolicy::All, vec!["v1", "v2", "v3"], 0)]
#[case::specific(
    CleanupPolicy::Specific { voice_ids: vec!["v3".into(), "v0".into(), "missing".into()] },
    vec!["v3"],
    2
)]
#[case::specific_duplicates(
    CleanupPolicy::Specific { voice_ids: vec!["v2".into(), "v2".into(), "v1".into(), "v2".into()] },
    vec!["v2", "v1"],
    1
)]
#[tokio::test]
async fn test_cleanup_policies(
    #[case] policy: CleanupPolicy,
    #[case] expected: Vec<&str>,
    #[case] remaining: usize,
) {
    let mut existing = voices(4, true);
    existing[0].managed = false;
    let client = Arc::new(FakeSynthesisClient::new(10).with_voices(existing));

    let report = manager(&client, 3).cleanup(&policy).await.unwrap();

    assert_eq!(report.deleted, expected);
    assert!(report.failed.is_empty());
    assert_eq!(report.remaining, remaining);
    assert!(client.voice_ids().contains(&"v0".to_string()));
}

#[tokio::test]
async fn test_cleanup_reports_failed_deletions() {
    let client = Arc::new(
        FakeSynthesisClient::new(10)
            .with_voices(voices(2, true))
            .with_failing_delete("v1"),
    );

    let report = manager(&client, 3).cleanup(&CleanupPolicy::All).await.unwrap();

    assert_eq!(report.deleted, vec!["v0"]);
    assert_eq!(report.failed, vec!["v1"]);
    assert_eq!(report.remaining, 1);
}
