use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Register descriptions once per process. Safe to call from every entry point.
pub fn describe_metrics() {
    static DESCRIBED: OnceCell<()> = OnceCell::new();
    DESCRIBED.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Completed ingestion runs");
        describe_counter!("ingest_entries_total", "New feed entries collected");
        describe_counter!("ingest_feed_errors_total", "Feeds that failed to fetch or parse");
        describe_gauge!("ingest_last_run_ts", "Unix time of the last ingestion run");
        describe_counter!("rewrite_success_total", "Entries rewritten into candidates");
        describe_counter!("rewrite_failures_total", "Entries dropped by the rewrite step");
        describe_gauge!("review_pending", "Candidates awaiting a review decision");
        describe_counter!("publish_success_total", "Articles committed to the content repository");
        describe_counter!("publish_failures_total", "Failed publish attempts");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if another recorder is already set.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        describe_metrics();
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
