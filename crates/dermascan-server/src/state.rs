//! Shared application state

use crate::config::ServerConfig;
use dermascan_inference::Predictor;
use dermascan_store::PredictionStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// State handed to every request handler.
///
/// Cloning is cheap; everything behind it is shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub predictor: Arc<dyn Predictor>,
    pub store: Arc<dyn PredictionStore>,
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        predictor: Arc<dyn Predictor>,
        store: Arc<dyn PredictionStore>,
        metrics_handle: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            predictor,
            store,
            metrics_handle,
        }
    }
}
