#![allow(dead_code)]

use async_trait::async_trait;
use build_relay::ci::BuildService;
use build_relay::config::ReleaseSettings;
use build_relay::distribution::{ChannelSlot, DistributionChannel, Distributor, UploadReceipt};
use build_relay::download::Downloader;
use build_relay::error::{RelayError, Result};
use build_relay::event::{BuildEvent, Link, ShareLinkRequest, ShareLinkResult};
use build_relay::notify::Notifier;
use build_relay::pipeline::Pipeline;
use build_relay::share::SharePublisher;
use build_relay::storage::{ArtifactReader, ArtifactStore};
use build_relay::utils::build_http_client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;

pub const SHARE_BASE: &str = "https://share.example/";

/// CI double with a scripted detail document and share id
pub struct FakeCi {
    detail: Option<Value>,
    routes: HashMap<String, Value>,
    share: std::result::Result<String, String>,
    gate: Option<Arc<Notify>>,
    pub fetches: AtomicUsize,
    pub shares: AtomicUsize,
}

impl FakeCi {
    pub fn returning(detail: Value) -> Self {
        Self {
            detail: Some(detail),
            routes: HashMap::new(),
            share: Ok("abc123".to_string()),
            gate: None,
            fetches: AtomicUsize::new(0),
            shares: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            detail: None,
            ..Self::returning(Value::Null)
        }
    }

    /// Answer fetches of `href` with `detail` instead of the default document
    pub fn with_route(mut self, href: &str, detail: Value) -> Self {
        self.routes.insert(href.to_string(), detail);
        self
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_share_failure(mut self) -> Self {
        self.share = Err("HTTP 500".to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn share_count(&self) -> usize {
        self.shares.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildService for FakeCi {
    async fn fetch_build(&self, href: &str) -> Result<BuildEvent> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.routes.get(href).or(self.detail.as_ref()) {
            Some(detail) => Ok(serde_json::from_value(detail.clone()).expect("valid detail")),
            None => Err(RelayError::UpstreamFetch("connection reset by peer".to_string())),
        }
    }

    async fn create_share(&self, _link: &Link) -> Result<ShareLinkResult> {
        self.shares.fetch_add(1, Ordering::SeqCst);
        match &self.share {
            Ok(id) => Ok(ShareLinkResult { shareid: id.clone() }),
            Err(reason) => Err(RelayError::ShareLink(reason.clone())),
        }
    }
}

/// Channel that records the bytes it was handed.
///
/// A gated channel holds its first upload until the gate is notified and
/// signals `parked` once that upload is waiting.
#[derive(Default)]
pub struct RecordingChannel {
    pub uploads: Mutex<Vec<String>>,
    pub parked: Notify,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingChannel {
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Mutex::new(Some(gate)),
            ..Self::default()
        }
    }
}

#[async_trait]
impl DistributionChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn upload(
        &self,
        mut artifact: ArtifactReader,
        _release: &ReleaseSettings,
    ) -> Result<UploadReceipt> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.parked.notify_one();
            gate.notified().await;
        }
        let mut content = String::new();
        artifact.file.read_to_string(&mut content).await?;
        self.uploads.lock().unwrap().push(content);
        Ok(UploadReceipt {
            status: 201,
            body: "{}".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub requests: Mutex<Vec<ShareLinkRequest>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, request: &ShareLinkRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

pub fn pipeline(
    ci: Arc<FakeCi>,
    channel: Arc<RecordingChannel>,
    notifier: Option<Arc<RecordingNotifier>>,
    artifact_dir: &Path,
) -> Pipeline {
    let store = ArtifactStore::new(artifact_dir);
    let client = build_http_client(Duration::from_secs(5)).unwrap();
    let notifier = notifier.map(|n| n as Arc<dyn Notifier>);

    Pipeline::new(
        ci.clone(),
        Downloader::new(client, store.clone()),
        Distributor::new(
            store,
            vec![ChannelSlot::Wired(channel)],
            ReleaseSettings::default(),
        ),
        SharePublisher::new(ci, notifier, SHARE_BASE.to_string()),
    )
}
