// src/metrics.rs
//! Prometheus recorder install plus the /metrics exposition route.

use axum::{extract::State, routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-global recorder. Call once at startup, before
    /// the first batch records anything.
    pub fn init(max_concurrency: usize) -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        // Static gauge carrying the configured fan-out cap.
        gauge!("extract_max_concurrency").set(max_concurrency as f64);

        Self { handle }
    }

    /// Exposition route, merged into the main router at startup.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(render))
            .with_state(self.handle.clone())
    }
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
