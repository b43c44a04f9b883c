//! Notification channel tests

use std::path::PathBuf;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::core::notify::{
    EmailNotifier, JobNotification, MockNotifier, NotificationConfig, NotificationDispatcher,
    NotificationTarget, Notifier, NotifyError, WebhookNotifier,
};
use crate::core::queue::{Job, JobError, JobSpec, JobStatus};
use crate::core::voice::types::ErrorKind;

fn finished(status: JobStatus, target: NotificationTarget) -> JobNotification {
    let mut job = Job::new(
        "vcj_0123456789ab".to_string(),
        JobSpec::new("Narrator", "Hello.", "eleven_multilingual_v2", vec![])
            .with_notification(target),
    );
    job.mark_processing();
    match status {
        JobStatus::Completed => job.mark_completed(PathBuf::from("/out/a.mp3"), 1024),
        JobStatus::Failed => job.mark_failed(JobError::new(ErrorKind::ProviderError, "HTTP 500")),
        _ => job.mark_cancelled(),
    }
    JobNotification::from_job(&job)
}

fn webhook_target(server: &MockServer) -> NotificationTarget {
    NotificationTarget {
        email: None,
        webhook_url: Some(format!("{}/hooks/voice", server.uri())),
    }
}

fn email_config(server: &MockServer) -> NotificationConfig {
    NotificationConfig {
        resend_api_key: "re_test".to_string(),
        resend_base_url: server.uri(),
        from_email: "noreply@example.com".to_string(),
        ..Default::default()
    }
}

// ============================================================================
// Webhook
// ============================================================================

#[tokio::test]
async fn test_webhook_posts_notification_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/voice"))
        .and(body_partial_json(json!({
            "event": "voice_cloning_completed",
            "job_id": "vcj_0123456789ab",
            "status": "completed",
            "output_size": 1024
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(5).unwrap();
    notifier
        .notify(&finished(JobStatus::Completed, webhook_target(&server)))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_webhook_rejection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = WebhookNotifier::new(5)
        .unwrap()
        .notify(&finished(JobStatus::Failed, webhook_target(&server)))
        .await
        .unwrap_err();
    match err {
        NotifyError::Rejected { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// ============================================================================
// Email
// ============================================================================

#[tokio::test]
async fn test_email_sent_for_completed_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("authorization", "Bearer re_test"))
        .and(body_partial_json(json!({ "to": ["listener@example.com"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_1" })))
        .expect(1)
        .mount(&server)
        .await;

    let target = NotificationTarget {
        email: Some("listener@example.com".to_string()),
        webhook_url: None,
    };
    EmailNotifier::new(&email_config(&server))
        .unwrap()
        .notify(&finished(JobStatus::Completed, target))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancelled_job_is_not_emailed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let target = NotificationTarget {
        email: Some("listener@example.com".to_string()),
        webhook_url: None,
    };
    EmailNotifier::new(&email_config(&server))
        .unwrap()
        .notify(&finished(JobStatus::Cancelled, target))
        .await
        .unwrap();
}

// ============================================================================
// Dispatcher
// ============================================================================

#[tokio::test]
async fn test_dispatcher_swallows_channel_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let dispatcher = NotificationDispatcher::from_config(&email_config(&server)).unwrap();
    let target = NotificationTarget {
        email: Some("listener@example.com".to_string()),
        webhook_url: Some(format!("{}/hooks/voice", server.uri())),
    };

    assert!(dispatcher
        .notify(&finished(JobStatus::Failed, target))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_dispatcher_without_email_key_skips_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/voice"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = NotificationDispatcher::from_config(&NotificationConfig::default()).unwrap();
    let target = NotificationTarget {
        email: Some("listener@example.com".to_string()),
        webhook_url: Some(format!("{}/hooks/voice", server.uri())),
    };
    dispatcher
        .notify(&finished(JobStatus::Completed, target))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mock_notifier_receives_terminal_event() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .withf(|n| n.status == JobStatus::Failed && n.event == "voice_cloning_failed")
        .times(1)
        .returning(|_| Ok(()));

    let target = NotificationTarget {
        email: None,
        webhook_url: Some("http://localhost/hook".to_string()),
    };
    notifier
        .notify(&finished(JobStatus::Failed, target))
        .await
        .unwrap();
}
