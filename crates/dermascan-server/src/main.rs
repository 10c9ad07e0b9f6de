//! Process bootstrap for the Dermascan API server

use anyhow::Result;
use clap::Parser;
use dermascan_inference::{HttpBlobStore, PredictionService};
use dermascan_server::{routes, AppState, Cli, ServerConfig};
use dermascan_store::JsonlStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting Dermascan API server");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!(
        "Model artifact: gs://{}/{}",
        config.inference.artifact.bucket, config.inference.artifact.prefix
    );
    info!("History directory: {}", config.data_dir.display());

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Wire up the pipeline. The model itself is not fetched here; the first
    // /predict request triggers the one-time download and load.
    let blob = Arc::new(HttpBlobStore::new(config.inference.fetch_timeout())?);
    let predictor = Arc::new(PredictionService::from_config(&config.inference, blob));
    let store = Arc::new(JsonlStore::open(&config.data_dir)?);

    let addr: SocketAddr = format!("{}:{}", config.listen, config.port).parse()?;
    let state = AppState::new(config, predictor, store, metrics_handle);

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown = async {
        shutdown_signal().await;
        warn!("Shutdown signal received, stopping server...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("dermascan=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dermascan=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "dermascan_requests_total",
        "Total number of requests processed by endpoint"
    );
    metrics::describe_counter!(
        "dermascan_predictions_total",
        "Total number of completed predictions by result label"
    );
    metrics::describe_histogram!(
        "dermascan_model_load_seconds",
        metrics::Unit::Seconds,
        "Time spent fetching and loading the model artifact"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
