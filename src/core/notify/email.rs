use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{JobNotification, NotificationConfig, Notifier, NotifyError};
use crate::core::queue::JobStatus;

/// Sends completion and failure emails through the Resend API.
pub struct EmailNotifier {
    client: Client,
    api_key: String,
    base_url: String,
    from: String,
}

impl EmailNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.resend_api_key.clone(),
            base_url: config.resend_base_url.trim_end_matches('/').to_string(),
            from: format!("{} <{}>", config.from_name, config.from_email),
        })
    }

    fn compose(notification: &JobNotification) -> Option<(String, String)> {
        let completed_at = notification.timestamp.format("%B %d, %Y at %H:%M UTC");
        match notification.status {
            JobStatus::Completed => Some((
                format!("Your voice clone \"{}\" is ready", notification.voice_name),
                format!(
                    "<h1>Your audio is ready</h1>\
                     <p><strong>Voice:</strong> {}</p>\
                     <p><strong>Reference:</strong> {}</p>\
                     <p><strong>Completed:</strong> {}</p>",
                    escape_html(&notification.voice_name),
                    notification.job_id,
                    completed_at
                ),
            )),
            JobStatus::Failed => {
                let error = notification
                    .error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .unwrap_or("Unknown error");
                Some((
                    format!("Voice clone \"{}\" could not be completed", notification.voice_name),
                    format!(
                        "<h1>We could not finish your audio</h1>\
                         <p><strong>Voice:</strong> {}</p>\
                         <p><strong>Job ID:</strong> {}</p>\
                         <p><strong>Error:</strong> {}</p>\
                         <p>Please try again with clear audio recordings.</p>",
                        escape_html(&notification.voice_name),
                        notification.job_id,
                        escape_html(error)
                    ),
                ))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
        let Some(recipient) = notification.target.email.as_deref() else {
            return Ok(());
        };
        // Cancellations are not emailed
        let Some((subject, html)) = Self::compose(notification) else {
            return Ok(());
        };

        let body = json!({
            "from": self.from,
            "to": [recipient],
            "subject": subject,
            "html": html,
            "tags": [
                { "name": "job_type", "value": notification.event },
                { "name": "job_id", "value": notification.job_id }
            ]
        });

        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
