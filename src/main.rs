use build_relay::config::RelayConfig;
use build_relay::logging::{FileLogger, setup_logging};
use build_relay::pipeline::Pipeline;
use build_relay::{AppState, api};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv::dotenv().ok();

    let config = match RelayConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let file_logger = config.log_dir.clone().map(FileLogger::new);
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
    });
    let app = api::router(state);

    info!("Listening on {}", config.bind_address);
    info!("Artifacts stored in {:?}", config.artifact_dir);
    if config.notification_url.is_none() {
        info!("No PERMALINK_API_URL set; share links will not be forwarded");
    }

    let listener = match tokio::net::TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_address, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
}
