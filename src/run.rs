use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Acknowledgment, RelayError};
use crate::event::BuildEvent;

/// Where a pipeline run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Received,
    DetailFetched,
    SentToBuilder,
    Started,
    Queued,
    Success,
    Canceled,
    Unknown,
    Failed,
}

/// One-shot reply channel back to the webhook caller.
///
/// Owned by exactly one run. The first message wins; anything reported after
/// that is only logged.
#[derive(Debug)]
pub struct AckHandle {
    sender: Mutex<Option<oneshot::Sender<Acknowledgment>>>,
}

impl AckHandle {
    pub fn channel() -> (Self, oneshot::Receiver<Acknowledgment>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn take(&self) -> Option<oneshot::Sender<Acknowledgment>> {
        match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn is_open(&self) -> bool {
        match self.sender.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|tx| !tx.is_closed()),
            Err(poisoned) => poisoned.get_ref().as_ref().is_some_and(|tx| !tx.is_closed()),
        }
    }

    /// Deliver an acknowledgment. Returns false when the channel was already used or closed.
    pub fn send(&self, ack: Acknowledgment) -> bool {
        match self.take() {
            Some(tx) => tx.send(ack).is_ok(),
            None => false,
        }
    }
}

/// Per-delivery execution context
#[derive(Debug)]
pub struct PipelineRun {
    pub id: String,
    pub event: BuildEvent,
    pub received_at: DateTime<Utc>,
    state: RunState,
    ack: AckHandle,
}

impl PipelineRun {
    /// Create a run for a received event along with the receiver for its acknowledgment
    pub fn new(event: BuildEvent) -> (Self, oneshot::Receiver<Acknowledgment>) {
        let (ack, rx) = AckHandle::channel();
        let run = Self {
            id: Uuid::now_v7().to_string(),
            event,
            received_at: Utc::now(),
            state: RunState::Received,
            ack,
        };
        (run, rx)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn advance(&mut self, next: RunState) {
        debug!("Run {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
    }

    pub fn acknowledge(&self, ack: Acknowledgment) -> bool {
        self.ack.send(ack)
    }

    /// Report an error to the caller if the acknowledgment is still unsent, otherwise log it.
    pub fn report_error(&self, error: &RelayError) -> bool {
        let delivered = self.ack.send(error.to_acknowledgment());
        if !delivered {
            warn!(
                "Run {}: caller already acknowledged, error logged only: {}",
                self.id, error
            );
        }
        delivered
    }

    pub fn ack_open(&self) -> bool {
        self.ack.is_open()
    }
}
