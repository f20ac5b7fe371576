// src/ingest/scheduler.rs
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::api::AppState;
use crate::ingest::Cycle;

/// Run `cycle` every `interval` (first tick fires immediately) and publish
/// each finished report to `state`. A failing cycle is logged and the
/// previous report stays published.
pub fn spawn_scheduler(cycle: Arc<Cycle>, interval: Duration, state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            counter!("curator_cycles_total").increment(1);

            match cycle.run_once().await {
                Ok(Some(report)) => {
                    gauge!("curator_last_cycle_ts").set(report.generated_at.timestamp() as f64);
                    tracing::info!(
                        target: "ingest",
                        channels = report.channels.len(),
                        "scheduled cycle finished"
                    );
                    state.publish(report);
                }
                Ok(None) => {}
                Err(e) => {
                    counter!("curator_cycle_errors_total").increment(1);
                    tracing::warn!(target: "ingest", error = ?e, "scheduled cycle failed");
                }
            }
        }
    })
}
