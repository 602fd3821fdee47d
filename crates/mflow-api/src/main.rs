//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mflow_api::{create_router, ApiConfig, AppState};
use mflow_media::{ProcessToolRunner, RunnerConfig};
use mflow_pipeline::{Orchestrator, PipelineConfig};
use mflow_storage::S3ArtifactStore;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("mflow=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting mflow-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    if let Err(e) = ProcessToolRunner::check_tools() {
        warn!("Tool check failed at startup: {}", e);
    }

    let artifacts = match S3ArtifactStore::from_env() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to create storage client: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = artifacts.check_connectivity().await {
        warn!("Storage connectivity check failed: {}", e);
    }

    let runner = Arc::new(ProcessToolRunner::new(RunnerConfig::from_env()));
    let orchestrator = Arc::new(Orchestrator::new(
        PipelineConfig::from_env(),
        artifacts,
        runner,
    ));

    let state = AppState::new(config.clone(), Arc::clone(&orchestrator));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    // Drain: nothing may be left ambiguously in flight
    orchestrator.shutdown().await;

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
