//! Fan-out of a downloaded artifact to every configured release channel.
//!
//! Each channel gets its own read stream over the stored file and runs
//! concurrently with the others. The artifact and its run's storage scope are
//! removed once, after every channel has finished, whatever the individual
//! outcomes were.

pub mod hockeyapp;

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{DistributionConfig, ReleaseSettings};
use crate::download::Artifact;
use crate::error::{RelayError, Result};
use crate::storage::{ArtifactReader, ArtifactStore};
use crate::utils::build_http_client;

pub use hockeyapp::HockeyAppChannel;

/// Remote response to a successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub status: u16,
    pub body: String,
}

/// A release channel that accepts artifact uploads.
#[async_trait]
pub trait DistributionChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn upload(
        &self,
        artifact: ArtifactReader,
        release: &ReleaseSettings,
    ) -> Result<UploadReceipt>;
}

/// A configured channel, with or without an implementation behind it
#[derive(Clone)]
pub enum ChannelSlot {
    Wired(Arc<dyn DistributionChannel>),
    /// Named in configuration but not implemented; always reported as skipped
    Unwired(String),
}

impl ChannelSlot {
    pub fn name(&self) -> &str {
        match self {
            ChannelSlot::Wired(channel) => channel.name(),
            ChannelSlot::Unwired(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelStatus {
    Delivered(UploadReceipt),
    Failed(String),
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOutcome {
    pub channel: String,
    pub status: ChannelStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionReport {
    pub outcomes: Vec<ChannelOutcome>,
    /// Whether the local artifact was deleted after the last channel finished
    pub cleaned: bool,
}

impl DistributionReport {
    pub fn delivered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ChannelStatus::Delivered(_)))
            .count()
    }
}

pub struct Distributor {
    store: ArtifactStore,
    slots: Vec<ChannelSlot>,
    release: ReleaseSettings,
}

impl Distributor {
    pub fn new(store: ArtifactStore, slots: Vec<ChannelSlot>, release: ReleaseSettings) -> Self {
        Self {
            store,
            slots,
            release,
        }
    }

    /// Build channel slots from configuration. Unknown names become no-op slots.
    pub fn from_config(
        config: &DistributionConfig,
        store: ArtifactStore,
        transfer_timeout: Duration,
    ) -> Result<Self> {
        let mut slots = Vec::with_capacity(config.channels.len());
        for name in &config.channels {
            match name.as_str() {
                hockeyapp::CHANNEL_NAME => {
                    let key = config.hockeyapp_api_key.clone().ok_or_else(|| {
                        RelayError::ConfigError(
                            "Channel 'hockeyapp' is configured but HOCKEYAPP_KEY is not set"
                                .to_string(),
                        )
                    })?;
                    let channel = HockeyAppChannel::new(
                        build_http_client(transfer_timeout)?,
                        config.hockeyapp_upload_url.clone(),
                        key,
                    );
                    slots.push(ChannelSlot::Wired(Arc::new(channel)));
                }
                other => {
                    warn!(
                        "Distribution channel '{}' has no implementation; it will be skipped",
                        other
                    );
                    slots.push(ChannelSlot::Unwired(other.to_string()));
                }
            }
        }
        Ok(Self::new(store, slots, config.release.clone()))
    }

    pub fn slots(&self) -> &[ChannelSlot] {
        &self.slots
    }

    pub async fn distribute(&self, artifact: &Artifact) -> DistributionReport {
        let store = match self.store.scoped(&artifact.run_id) {
            Ok(store) => store,
            Err(e) => {
                error!("No storage scope for run {}: {}", artifact.run_id, e);
                return DistributionReport {
                    outcomes: Vec::new(),
                    cleaned: false,
                };
            }
        };

        let attempts = self
            .slots
            .iter()
            .map(|slot| self.attempt(&store, slot, artifact));
        let outcomes = join_all(attempts).await;

        let cleaned = match store.remove(&artifact.filename).await {
            Ok(removed) => removed,
            Err(e) => {
                error!("Failed to remove artifact {}: {}", artifact.filename, e);
                false
            }
        };
        if let Err(e) = store.purge().await {
            warn!("Failed to remove artifact directory for run {}: {}", artifact.run_id, e);
        }

        let report = DistributionReport { outcomes, cleaned };
        info!(
            "Distribution of {} finished: {}/{} channels delivered",
            artifact.filename,
            report.delivered(),
            report.outcomes.len()
        );
        report
    }

    async fn attempt(
        &self,
        store: &ArtifactStore,
        slot: &ChannelSlot,
        artifact: &Artifact,
    ) -> ChannelOutcome {
        let channel = slot.name().to_string();
        let status = match slot {
            ChannelSlot::Unwired(_) => ChannelStatus::Skipped,
            ChannelSlot::Wired(target) => match self.upload_to(store, target.as_ref(), artifact).await {
                Ok(receipt) => {
                    info!("Uploaded {} to {} (HTTP {})", artifact.filename, channel, receipt.status);
                    ChannelStatus::Delivered(receipt)
                }
                Err(e) => {
                    error!("Upload of {} to {} failed: {}", artifact.filename, channel, e);
                    ChannelStatus::Failed(e.to_string())
                }
            },
        };
        ChannelOutcome { channel, status }
    }

    async fn upload_to(
        &self,
        store: &ArtifactStore,
        target: &dyn DistributionChannel,
        artifact: &Artifact,
    ) -> Result<UploadReceipt> {
        let reader = store.open(&artifact.filename).await.map_err(|e| {
            RelayError::Transfer(format!(
                "Error reading {} for upload to {}: {}",
                artifact.filename,
                target.name(),
                e
            ))
        })?;
        target.upload(reader, &self.release).await
    }
}
