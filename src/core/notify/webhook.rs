use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{JobNotification, Notifier, NotifyError};

/// POSTs the notification JSON to the job's webhook URL.
pub struct WebhookNotifier {
    client: Client,
}

impl WebhookNotifier {
    pub fn new(timeout_secs: u64) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &JobNotification) -> Result<(), NotifyError> {
        let Some(url) = notification.target.webhook_url.as_deref() else {
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .header("User-Agent", concat!("voxclone/", env!("CARGO_PKG_VERSION")))
            .json(notification)
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
