//! Webhook handler for CI build events

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{Instrument, error, info, info_span};

use crate::SharedState;
use crate::error::Acknowledgment;
use crate::event::BuildEvent;
use crate::run::PipelineRun;

/// Handles `POST /build`.
///
/// The run is spawned onto its own task and the response is whatever the run
/// acknowledges first: acceptance, or the validation error that stopped it.
pub async fn handle_build(AxumState(state): AxumState<SharedState>, body: Bytes) -> Response {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(Acknowledgment::rejected("Missing build event body")),
        )
            .into_response();
    }

    let event: BuildEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            info!("Could not parse build event: {:?}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(Acknowledgment::rejected(format!("Malformed build event: {}", e))),
            )
                .into_response();
        }
    };

    let (run, ack_rx) = PipelineRun::new(event);
    let span = info_span!("run", id = %run.id, project = %run.event.project_name);
    info!(parent: &span, "Received build event");

    let pipeline = state.pipeline.clone();
    tokio::spawn(
        async move {
            let report = pipeline.execute(run).await;
            let elapsed = Utc::now() - report.received_at;
            info!(
                "Run finished in state {:?} after {} ms",
                report.state,
                elapsed.num_milliseconds()
            );
        }
        .instrument(span),
    );

    match ack_rx.await {
        Ok(ack) if ack.error => (StatusCode::BAD_REQUEST, Json(ack)).into_response(),
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(_) => {
            error!("Pipeline run ended without acknowledging the webhook");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Acknowledgment::rejected("Build event was not processed")),
            )
                .into_response()
        }
    }
}
