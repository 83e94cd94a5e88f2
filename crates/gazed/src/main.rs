use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;
mod store;
#[cfg(test)]
mod testutil;

use config::Config;
use engine::{spawn_engine, EnrollLimits};
use gaze_core::OnnxAnalyzer;
use http::AppState;
use store::{FaceStore, JsonFileBackend};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("gazed starting");
    let config = Config::from_env();

    // Fail fast if either model file is missing.
    let analyzer = OnnxAnalyzer::load(
        &config.detector_model_path(),
        &config.embedder_model_path(),
    )?;
    let engine = spawn_engine(
        analyzer,
        EnrollLimits {
            max_samples: config.samples_per_registration,
            thumbnail_size: config.thumbnail_size,
        },
    );

    let store = FaceStore::open(Box::new(JsonFileBackend::new(config.data_path.clone())));
    tracing::info!(
        count = store.len(),
        path = %config.data_path.display(),
        "identity store ready"
    );

    let state = Arc::new(AppState {
        store: RwLock::new(store),
        engine,
        match_threshold: config.match_threshold,
        samples_per_registration: config.samples_per_registration,
        model_status: "UltraFace detector and ArcFace embedder loaded".to_string(),
    });

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "gazed ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("gazed shutting down");
        })
        .await?;

    Ok(())
}
