//! Drives one build event from receipt to its terminal state.
//!
//! A run acknowledges the caller as soon as the event is known to be usable,
//! then fetches the build detail and dispatches on its status. A successful
//! build forks into two independent sub-flows that run concurrently:
//! download + distribution, and share link + notification.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::ci::{BuildService, CiClient};
use crate::config::RelayConfig;
use crate::distribution::{DistributionReport, Distributor};
use crate::download::Downloader;
use crate::error::{Acknowledgment, RelayError, Result};
use crate::event::{BuildEvent, BuildStatus, usable};
use crate::notify::{HttpNotifier, Notifier};
use crate::run::{PipelineRun, RunState};
use crate::share::{ShareOutcome, SharePublisher};
use crate::storage::ArtifactStore;
use crate::utils::build_http_client;

/// What a run did, returned once it reaches a terminal state.
///
/// `state` stops at `Success` for a successful build. The two sub-flows that
/// follow run concurrently and carry their own progress: `distribution` is
/// the fan-out result, with `cleaned` set once the artifact was removed after
/// the last channel, and `share` holds the published URL with the
/// notification status. Both stay `None` for every other status.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub received_at: DateTime<Utc>,
    pub state: RunState,
    /// Error that ended the run before dispatch
    pub error: Option<RelayError>,
    pub distribution: Option<Result<DistributionReport>>,
    pub share: Option<Result<ShareOutcome>>,
}

pub struct Pipeline {
    ci: Arc<dyn BuildService>,
    downloader: Downloader,
    distributor: Distributor,
    publisher: SharePublisher,
}

impl Pipeline {
    pub fn new(
        ci: Arc<dyn BuildService>,
        downloader: Downloader,
        distributor: Distributor,
        publisher: SharePublisher,
    ) -> Self {
        Self {
            ci,
            downloader,
            distributor,
            publisher,
        }
    }

    /// Wire the production clients from configuration
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let store = ArtifactStore::new(&config.artifact_dir);
        let request_client = build_http_client(config.timeouts.request)?;
        let transfer_client = build_http_client(config.timeouts.transfer)?;

        let ci: Arc<dyn BuildService> = Arc::new(CiClient::new(request_client.clone(), &config.ci));
        let notifier = config.notification_url.as_ref().map(|url| {
            Arc::new(HttpNotifier::new(request_client.clone(), url.clone())) as Arc<dyn Notifier>
        });

        let distributor =
            Distributor::from_config(&config.distribution, store.clone(), config.timeouts.transfer)?;

        Ok(Self::new(
            ci.clone(),
            Downloader::new(transfer_client, store),
            distributor,
            SharePublisher::new(ci, notifier, config.ci.share_link_base.clone()),
        ))
    }

    pub async fn execute(&self, mut run: PipelineRun) -> RunReport {
        log_event_summary(&run.event);

        let api_self = match usable(&run.event.links.api_self) {
            Some(link) => link.href.clone(),
            None => {
                let err = RelayError::Validation("No build link from the CI webhook".to_string());
                warn!("Run {} rejected: {}", run.id, err);
                run.report_error(&err);
                return self.finish(run, RunState::Failed, Some(err));
            }
        };

        let accepted = Acknowledgment::accepted(format!(
            "Process begun for project '{}' platform '{}'.",
            run.event.project_name, run.event.build_target_name
        ));
        if !run.acknowledge(accepted) {
            debug!("Run {}: caller went away before acknowledgment", run.id);
        }

        let detail = match self.ci.fetch_build(&api_self).await {
            Ok(detail) => detail,
            Err(e) => {
                error!("Run {}: {}", run.id, e);
                run.report_error(&e);
                return self.finish(run, RunState::Failed, Some(e));
            }
        };
        run.advance(RunState::DetailFetched);

        let mut report = RunReport {
            run_id: run.id.clone(),
            received_at: run.received_at,
            state: run.state(),
            error: None,
            distribution: None,
            share: None,
        };

        match &detail.build_status {
            BuildStatus::SentToBuilder => {
                run.advance(RunState::SentToBuilder);
                info!("Build sent to builder");
            }
            BuildStatus::Started => {
                run.advance(RunState::Started);
                info!(
                    "Build started: {}",
                    detail.checkout_start_time.as_deref().unwrap_or("-")
                );
            }
            BuildStatus::Queued => {
                run.advance(RunState::Queued);
                info!("Build queued: {}", detail.created.as_deref().unwrap_or("-"));
                info!(
                    "Cooldown until: {}",
                    detail.cooldown_date.as_deref().unwrap_or("-")
                );
            }
            BuildStatus::Canceled => {
                run.advance(RunState::Canceled);
                info!("Build canceled: {}", detail.finished.as_deref().unwrap_or("-"));
            }
            BuildStatus::Unknown(raw) => {
                run.advance(RunState::Unknown);
                warn!("Unexpected build status '{}' for run {}", raw, run.id);
            }
            BuildStatus::Success => {
                run.advance(RunState::Success);
                let (distribution, share) =
                    tokio::join!(self.deliver(&run, &detail), self.share(&run, &detail));
                report.distribution = Some(distribution);
                report.share = Some(share);
            }
        }

        report.state = run.state();
        report
    }

    async fn deliver(&self, run: &PipelineRun, detail: &BuildEvent) -> Result<DistributionReport> {
        let result: Result<DistributionReport> = async {
            let link = usable(&detail.links.download_primary).ok_or_else(|| {
                RelayError::Validation("Build detail has no download_primary link".to_string())
            })?;
            let artifact = self.downloader.download(&run.id, &link.href).await?;
            Ok(self.distributor.distribute(&artifact).await)
        }
        .await;

        if let Err(e) = &result {
            error!("Run {}: distribution aborted: {}", run.id, e);
            if let Err(e) = self.downloader.discard(&run.id).await {
                warn!("Run {}: could not discard partial artifact: {}", run.id, e);
            }
        }
        result
    }

    async fn share(&self, run: &PipelineRun, detail: &BuildEvent) -> Result<ShareOutcome> {
        let result = self.publisher.publish(detail).await;
        if let Err(e) = &result {
            error!("Run {}: createShareLink: {}", run.id, e);
            run.report_error(e);
        }
        result
    }

    fn finish(&self, mut run: PipelineRun, state: RunState, error: Option<RelayError>) -> RunReport {
        run.advance(state);
        RunReport {
            run_id: run.id,
            received_at: run.received_at,
            state,
            error,
            distribution: None,
            share: None,
        }
    }
}

fn log_event_summary(event: &BuildEvent) {
    info!("Project: {}", event.project_name);
    info!("Target: {}", event.build_target_name);
    info!("Started by: {}", event.started_by.as_deref().unwrap_or("-"));
    info!("Build status: {}", event.build_status);
}
