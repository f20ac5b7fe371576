use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::engine::RunStats;
use crate::model::ProbeResult;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Call once per process.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
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

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("curator_candidates_total", "Candidates offered to the engine.");
        describe_counter!("curator_probes_total", "Probes that completed (alive or dead).");
        describe_counter!("curator_probes_alive_total", "Probes that found the source alive.");
        describe_counter!(
            "curator_suppressed_total",
            "URLs skipped because they were in cooldown."
        );
        describe_counter!(
            "curator_probes_abandoned_total",
            "Probes abandoned when the run deadline expired."
        );
        describe_counter!(
            "curator_provider_errors_total",
            "Playlist provider fetch/parse errors."
        );
        describe_counter!("curator_cycles_total", "Scheduled collect/select cycles started.");
        describe_counter!("curator_cycle_errors_total", "Scheduled cycles that failed.");
        describe_gauge!("curator_last_cycle_ts", "Unix ts of the last published report.");
        describe_gauge!("curator_channels_selected", "Channels with at least one source in the last run.");
        describe_gauge!(
            "curator_channels_without_source",
            "Channels dropped in the last run for lack of an alive source."
        );
        describe_gauge!("curator_last_run_ts", "Unix ts when the last run finished.");
        describe_histogram!("curator_run_duration_ms", "Run duration in milliseconds.");
        describe_histogram!("curator_probe_latency_ms", "Latency of alive probes in milliseconds.");
    });
}

pub fn record_probe(result: &ProbeResult) {
    counter!("curator_probes_total").increment(1);
    if result.alive {
        counter!("curator_probes_alive_total").increment(1);
        histogram!("curator_probe_latency_ms").record(result.latency_secs * 1_000.0);
    }
}

pub fn record_run(stats: &RunStats) {
    ensure_metrics_described();
    counter!("curator_candidates_total").increment(stats.candidates_seen as u64);
    counter!("curator_suppressed_total").increment(stats.urls_suppressed as u64);
    counter!("curator_probes_abandoned_total").increment(stats.probes_abandoned as u64);
    gauge!("curator_channels_selected").set(stats.channels_selected as f64);
    gauge!("curator_channels_without_source").set(stats.channels_without_source as f64);
    histogram!("curator_run_duration_ms").record(stats.duration_ms as f64);
    gauge!("curator_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
}
