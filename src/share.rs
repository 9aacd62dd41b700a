//! Share-link creation and forwarding to the notification endpoint

use std::sync::Arc;
use tracing::{error, info};

use crate::ci::BuildService;
use crate::error::{RelayError, Result};
use crate::event::{BuildEvent, ShareLinkRequest, usable};
use crate::notify::Notifier;
use crate::utils::join_url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyStatus {
    Sent,
    Failed,
    /// No notification endpoint configured
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShareOutcome {
    pub share_url: String,
    pub notify: NotifyStatus,
}

pub struct SharePublisher {
    ci: Arc<dyn BuildService>,
    notifier: Option<Arc<dyn Notifier>>,
    share_link_base: String,
}

impl SharePublisher {
    pub fn new(
        ci: Arc<dyn BuildService>,
        notifier: Option<Arc<dyn Notifier>>,
        share_link_base: String,
    ) -> Self {
        Self {
            ci,
            notifier,
            share_link_base,
        }
    }

    /// Create the share link named by `links.create_share` and forward it.
    ///
    /// Only the share-link call can fail this step; notification problems are
    /// logged and reported in the outcome.
    pub async fn publish(&self, event: &BuildEvent) -> Result<ShareOutcome> {
        let link = usable(&event.links.create_share).ok_or_else(|| {
            RelayError::Validation("Build detail has no create_share link".to_string())
        })?;

        let result = self.ci.create_share(link).await?;
        let share_url = join_url(&self.share_link_base, &result.shareid);
        info!("share link: {}", share_url);

        let notify = match &self.notifier {
            Some(notifier) => {
                let request = ShareLinkRequest::from_event(event, share_url.clone());
                match notifier.notify(&request).await {
                    Ok(()) => NotifyStatus::Sent,
                    Err(e) => {
                        error!("Forwarding share link failed: {}", e);
                        NotifyStatus::Failed
                    }
                }
            }
            None => {
                info!("No notification endpoint configured; share link not forwarded");
                NotifyStatus::Disabled
            }
        };

        Ok(ShareOutcome { share_url, notify })
    }
}
