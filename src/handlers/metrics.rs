use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

use crate::observability::HTTP_REQUEST_DURATION_SECONDS;
use crate::AppState;

pub struct MetricsState {
    pub handle: PrometheusHandle,
}

impl MetricsState {
    /// A handle backed by a recorder that is not installed globally. Renders
    /// an empty exposition; used where several apps share one process.
    pub fn detached() -> Self {
        Self {
            handle: PrometheusBuilder::new().build_recorder().handle(),
        }
    }
}

/// Set up the Prometheus metrics recorder
pub fn setup_metrics_recorder() -> Result<MetricsState, BuildError> {
    let handle = PrometheusBuilder::new()
        // Latency buckets in seconds
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()?;

    Ok(MetricsState { handle })
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.handle.render())
}
