//! Job notifications
//!
//! Terminal job transitions are announced by email (Resend) and/or webhook,
//! according to the target supplied with the job. Delivery never feeds back
//! into job state.

mod email;
mod webhook;

pub use email::EmailNotifier;
pub use webhook::WebhookNotifier;

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::queue::{Job, JobError, JobStatus};

// ============================================================================
// Configuration & Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub webhook_enabled: bool,
    /// Resend API key; email is disabled while empty
    pub resend_api_key: String,
    pub resend_base_url: String,
    pub from_email: String,
    pub from_name: String,
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_enabled: true,
            resend_api_key: String::new(),
            resend_base_url: "https://api.resend.com".to_string(),
            from_email: "noreply@voxclone.local".to_string(),
            from_name: "voxclone".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Where to announce a job's outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl NotificationTarget {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.webhook_url.is_none()
    }
}

/// Payload describing a terminal job transition.
#[derive(Debug, Clone, Serialize)]
pub struct JobNotification {
    pub event: &'static str,
    pub job_id: String,
    pub status: JobStatus,
    pub voice_name: String,
    pub voice_id: Option<String>,
    pub output_path: Option<PathBuf>,
    pub output_size: Option<u64>,
    pub error: Option<JobError>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub target: NotificationTarget,
}

impl JobNotification {
    pub fn from_job(job: &Job) -> Self {
        let event = match job.status {
            JobStatus::Completed => "voice_cloning_completed",
            JobStatus::Failed => "voice_cloning_failed",
            JobStatus::Cancelled => "voice_cloning_cancelled",
            JobStatus::Pending | JobStatus::Processing => "voice_cloning_updated",
        };
        Self {
            event,
            job_id: job.id.clone(),
            status: job.status,
            voice_name: job.voice_name.clone(),
            voice_id: job.voice_id.clone(),
            output_path: job.output_path.clone(),
            output_size: job.output_size,
            error: job.error.clone(),
            timestamp: Utc::now(),
            target: job.notify.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

// ============================================================================
// Notifier Trait
// ============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError>;
}

/// Discards every notification.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notification: &JobNotification) -> Result<(), NotifyError> {
        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes notifications to email and webhook channels; never fails.
pub struct NotificationDispatcher {
    email: Option<EmailNotifier>,
    webhook: Option<WebhookNotifier>,
}

impl NotificationDispatcher {
    pub fn new(email: Option<EmailNotifier>, webhook: Option<WebhookNotifier>) -> Self {
        Self { email, webhook }
    }

    /// Build the channels enabled by `config`.
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let email = if config.resend_api_key.trim().is_empty() {
            log::info!("Email notifications disabled (no Resend API key)");
            None
        } else {
            Some(EmailNotifier::new(config)?)
        };
        let webhook = if config.webhook_enabled {
            Some(WebhookNotifier::new(config.timeout_secs)?)
        } else {
            None
        };
        Ok(Self::new(email, webhook))
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
        let email = async {
            match (&self.email, &notification.target.email) {
                (Some(notifier), Some(_)) => Some(notifier.notify(notification).await),
                _ => None,
            }
        };
        let webhook = async {
            match (&self.webhook, &notification.target.webhook_url) {
                (Some(notifier), Some(_)) => Some(notifier.notify(notification).await),
                _ => None,
            }
        };

        let (email, webhook) = futures::join!(email, webhook);
        for (channel, result) in [("email", email), ("webhook", webhook)] {
            match result {
                Some(Ok(())) => log::info!(
                    "Sent {} notification for job {}",
                    channel,
                    notification.job_id
                ),
                Some(Err(e)) => log::error!(
                    "Failed to send {} notification for job {}: {}",
                    channel,
                    notification.job_id,
                    e
                ),
                None => {}
            }
        }
        Ok(())
    }
}
