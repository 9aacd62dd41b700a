pub mod api;
pub mod ci;
pub mod config;
pub mod distribution;
pub mod download;
pub mod error;
pub mod event;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod run;
pub mod share;
pub mod storage;
pub mod ui;
pub mod utils;

use std::sync::Arc;

use pipeline::Pipeline;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

pub type SharedState = Arc<AppState>;
