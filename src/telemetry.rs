// src/telemetry.rs
//! Prometheus recorder and the `/metrics` route.

use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the series the pipeline emits.
    pub fn init(max_post_count: u32) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        describe_counter!(
            "chat_requests_total",
            "Chat requests by route (greeting, analysis, open_chat, limit)."
        );
        describe_counter!("sela_fetch_total", "Scraper fetch attempts by outcome.");
        describe_counter!(
            "chat_stream_failures_total",
            "Requests that ended in an error frame, by stage."
        );

        // static gauge with the hard post-count cap
        gauge!("chat_max_post_count").set(max_post_count as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
