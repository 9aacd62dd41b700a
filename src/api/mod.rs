//! HTTP surface: build webhook and static landing page

pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;
use crate::ui::{serve_asset, serve_index};

pub use webhook::handle_build;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(serve_index))
        .route("/public/{*path}", routing::get(serve_asset))
        .route("/build", routing::post(handle_build))
        .with_state(state)
}
