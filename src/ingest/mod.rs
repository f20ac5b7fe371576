// src/ingest/mod.rs
//! Glue between playlist collaborators and the selection engine: fetch
//! candidates from every provider, apply the name rules, run the engine, then
//! persist the ledger, the rendered playlist and a JSON run report.

pub mod m3u;
pub mod providers;
pub mod rules;
pub mod scheduler;
pub mod types;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::aggregate::aggregate_filtered;
use crate::config::{AppConfig, PathsConfig};
use crate::engine::{RunStats, SelectionEngine};
use crate::error::EngineError;
use crate::ledger::HealthLedger;
use crate::model::{Candidate, ChannelSelection};
use crate::probe::{HttpProber, Prober};
use rules::NameRules;
use types::PlaylistProvider;

/// What a finished cycle publishes (file + `/selection`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub stats: RunStats,
    pub channels: Vec<ChannelSelection>,
}

/// Fetch all providers concurrently; a failing provider is logged and skipped.
/// Output keeps provider order, then file order.
pub async fn collect_candidates(providers: &[Box<dyn PlaylistProvider>]) -> Vec<Candidate> {
    let fetched = futures::future::join_all(providers.iter().map(|p| p.fetch_candidates())).await;

    let mut raw = Vec::new();
    for (p, res) in providers.iter().zip(fetched) {
        match res {
            Ok(mut v) => {
                tracing::info!(target: "ingest", provider = p.name(), candidates = v.len(), "playlist fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("curator_provider_errors_total").increment(1);
            }
        }
    }
    raw
}

/// One full collect → select → persist pass.
pub struct Cycle {
    engine: SelectionEngine,
    providers: Vec<Box<dyn PlaylistProvider>>,
    rules: NameRules,
    paths: PathsConfig,
}

impl Cycle {
    pub fn new(
        engine: SelectionEngine,
        providers: Vec<Box<dyn PlaylistProvider>>,
        rules: NameRules,
        paths: PathsConfig,
    ) -> Self {
        Self {
            engine,
            providers,
            rules,
            paths,
        }
    }

    /// Wire the HTTP prober, providers and rule table from config.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        cfg.validate()?;
        let prober: Arc<dyn Prober> = Arc::new(HttpProber::new()?);
        let engine = SelectionEngine::new(cfg.engine.clone(), prober)?;
        let providers = providers::build_providers(
            &cfg.sources,
            Duration::from_secs(cfg.scheduler.fetch_timeout_secs),
        )?;
        let rules = rules::load_rules(cfg.paths.rules.as_deref())?;
        tracing::info!(
            target: "ingest",
            providers = providers.len(),
            rules = rules.len(),
            "cycle configured"
        );
        Ok(Self::new(engine, providers, rules, cfg.paths.clone()))
    }

    /// Returns `Ok(None)` when no provider produced any candidate; outputs are
    /// left untouched in that case.
    pub async fn run_once(&self) -> Result<Option<RunReport>> {
        let candidates = collect_candidates(&self.providers).await;
        let pool = aggregate_filtered(candidates, &self.rules);
        let ledger = HealthLedger::load_from_path(&self.paths.ledger).await;
        let now = Utc::now();

        let outcome = match self.engine.run_pool(pool, ledger, now).await {
            Ok(o) => o,
            Err(EngineError::EmptyInput) => {
                tracing::warn!(target: "ingest", "no candidates from any provider, nothing to do");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        outcome.ledger.save_to_path(&self.paths.ledger).await?;
        write_text(
            &self.paths.playlist,
            &m3u::render_selection(&outcome.selections),
        )
        .await?;

        let report = RunReport {
            generated_at: now,
            stats: outcome.stats,
            channels: outcome.selections,
        };
        let json = serde_json::to_string_pretty(&report).context("serializing run report")?;
        write_text(&self.paths.report, &json).await?;
        Ok(Some(report))
    }
}

async fn write_text(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
