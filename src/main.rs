//! Stream curator binary.
//! `CURATOR_MODE=once` (default) runs a single collect/select cycle and exits;
//! `CURATOR_MODE=serve` runs the scheduler and the HTTP API.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stream_curator::api::{self, AppState};
use stream_curator::config::{load_config_default, AppConfig};
use stream_curator::ingest::{scheduler::spawn_scheduler, Cycle};
use stream_curator::metrics::Metrics;

const DEFAULT_BIND: &str = "0.0.0.0:8080";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("engine=info,ingest=info,stream_curator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default()?;
    let cycle = Arc::new(Cycle::from_config(&cfg)?);

    let mode = std::env::var("CURATOR_MODE").unwrap_or_else(|_| "once".into());
    match mode.to_ascii_lowercase().as_str() {
        "serve" => serve(&cfg, cycle).await,
        _ => {
            match cycle.run_once().await? {
                Some(report) => tracing::info!(
                    channels = report.channels.len(),
                    playlist = %cfg.paths.playlist.display(),
                    "selection written"
                ),
                None => tracing::warn!("nothing selected, outputs left untouched"),
            }
            Ok(())
        }
    }
}

async fn serve(cfg: &AppConfig, cycle: Arc<Cycle>) -> Result<()> {
    let metrics = Metrics::init()?;
    let state = AppState::new();

    let interval = Duration::from_secs(cfg.scheduler.interval_secs);
    let _scheduler = spawn_scheduler(cycle, interval, state.clone());

    let app = api::router(state).merge(metrics.router());

    let bind = std::env::var("CURATOR_BIND").unwrap_or_else(|_| DEFAULT_BIND.into());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid CURATOR_BIND `{bind}`"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, interval_secs = interval.as_secs(), "serving");

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
