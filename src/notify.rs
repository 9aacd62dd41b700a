//! Fire-and-forget notification to the permalink service

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::event::ShareLinkRequest;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, request: &ShareLinkRequest) -> Result<()>;
}

pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, request: &ShareLinkRequest) -> Result<()> {
        debug!("Posting share link for '{}' to {}", request.project_name, self.url);
        self.client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| RelayError::Notification(format!("POST {}: {}", self.url, e)))?;
        Ok(())
    }
}
