//! # Selection Engine
//! Drives one run: `Collecting -> Probing -> Ranking -> Capping -> Done`.
//!
//! Probing fans out over a bounded pool (`buffer_unordered`). The loop that
//! consumes probe results is the only writer of the ledger, so writes are
//! serialized without locks. The loop also races the run deadline; whatever
//! has not finished by then is abandoned (excluded from selection, not
//! written to the ledger, counted in `RunStats::probes_abandoned`).
//!
//! Ranking and capping are pure: given the same pool, ledger and probe
//! results they always produce the same output.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::aggregate::{aggregate, ChannelPool};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger::HealthLedger;
use crate::model::{
    Candidate, ChannelIdentity, ChannelSelection, ProbeResult, RankedSource, Selection,
};
use crate::probe::Prober;
use crate::scorer::{score, sort_ranked};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Collecting,
    Probing,
    Ranking,
    Capping,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Collecting => "collecting",
            RunPhase::Probing => "probing",
            RunPhase::Ranking => "ranking",
            RunPhase::Capping => "capping",
            RunPhase::Done => "done",
        };
        f.write_str(s)
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub candidates_seen: usize,
    pub candidates_unique: usize,
    pub candidates_duplicate: usize,
    pub candidates_rejected: usize,
    pub channels_total: usize,
    pub urls_unique: usize,
    pub urls_probed: usize,
    pub urls_alive: usize,
    pub urls_suppressed: usize,
    pub stale_reused: usize,
    pub probes_abandoned: usize,
    pub deadline_exceeded: bool,
    pub channels_selected: usize,
    pub channels_without_source: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Selected channels in first-appearance order. Channels with no usable
    /// source are absent.
    pub selections: Vec<ChannelSelection>,
    pub ledger: HealthLedger,
    pub stats: RunStats,
}

impl RunOutcome {
    /// First selected channel with this display name. Channels sharing a name
    /// but not a guide id need `selection_for_identity`.
    pub fn selection_for(&self, name: &str) -> Option<&Selection> {
        self.selections
            .iter()
            .find(|c| c.identity.name == name)
            .map(|c| &c.selection)
    }

    pub fn selection_for_identity(&self, identity: &ChannelIdentity) -> Option<&Selection> {
        self.selections
            .iter()
            .find(|c| &c.identity == identity)
            .map(|c| &c.selection)
    }
}

/// Results gathered during the probing phase.
#[derive(Debug, Default)]
struct ProbeRound {
    results: HashMap<String, ProbeResult>,
    suppressed: HashSet<String>,
    abandoned: usize,
    deadline_exceeded: bool,
}

pub struct SelectionEngine {
    config: EngineConfig,
    prober: Arc<dyn Prober>,
}

impl SelectionEngine {
    /// Validates `config`; an invalid config never reaches probing.
    pub fn new(config: EngineConfig, prober: Arc<dyn Prober>) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self { config, prober })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(
        &self,
        candidates: Vec<Candidate>,
        ledger: HealthLedger,
    ) -> Result<RunOutcome, EngineError> {
        self.run_at(candidates, ledger, Utc::now()).await
    }

    /// Run with an explicit clock reading for cooldown checks and ledger writes.
    pub async fn run_at(
        &self,
        candidates: Vec<Candidate>,
        ledger: HealthLedger,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, EngineError> {
        if candidates.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        tracing::debug!(target: "engine", phase = %RunPhase::Collecting, candidates = candidates.len());
        self.run_pool(aggregate(candidates), ledger, now).await
    }

    /// Run over an already aggregated (and possibly name-filtered) pool.
    pub async fn run_pool(
        &self,
        pool: ChannelPool,
        mut ledger: HealthLedger,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, EngineError> {
        if pool.seen() == 0 {
            return Err(EngineError::EmptyInput);
        }
        let started = Instant::now();

        tracing::debug!(target: "engine", phase = %RunPhase::Probing, urls = pool.unique_urls().len());
        let round = self.probe_pool(&pool, &mut ledger, now).await;

        tracing::debug!(target: "engine", phase = %RunPhase::Ranking);
        let (ranked, stale_reused) = self.rank(&pool, &round, &ledger, now);

        tracing::debug!(target: "engine", phase = %RunPhase::Capping);
        let mut selections = Vec::with_capacity(ranked.len());
        let mut without_source = 0usize;
        for (identity, list) in ranked {
            if list.is_empty() {
                tracing::debug!(target: "engine", channel = %identity, "no alive source, channel dropped");
                without_source += 1;
                continue;
            }
            let selection =
                Selection::from_ranked(list, self.config.primary_cap, self.config.backup_cap);
            selections.push(ChannelSelection {
                identity,
                selection,
            });
        }

        let stats = RunStats {
            candidates_seen: pool.seen(),
            candidates_unique: pool.unique_candidates(),
            candidates_duplicate: pool.duplicates(),
            candidates_rejected: pool.rejected(),
            channels_total: pool.channel_count(),
            urls_unique: pool.unique_urls().len(),
            urls_probed: round.results.len(),
            urls_alive: round.results.values().filter(|r| r.alive).count(),
            urls_suppressed: round.suppressed.len(),
            stale_reused,
            probes_abandoned: round.abandoned,
            deadline_exceeded: round.deadline_exceeded,
            channels_selected: selections.len(),
            channels_without_source: without_source,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        crate::metrics::record_run(&stats);

        tracing::info!(
            target: "engine",
            phase = %RunPhase::Done,
            channels = stats.channels_selected,
            dropped = stats.channels_without_source,
            probed = stats.urls_probed,
            alive = stats.urls_alive,
            suppressed = stats.urls_suppressed,
            abandoned = stats.probes_abandoned,
            duration_ms = stats.duration_ms,
            "selection run finished"
        );

        Ok(RunOutcome {
            selections,
            ledger,
            stats,
        })
    }

    async fn probe_pool(
        &self,
        pool: &ChannelPool,
        ledger: &mut HealthLedger,
        now: DateTime<Utc>,
    ) -> ProbeRound {
        let cfg = &self.config;
        let cooldown = cfg.cooldown();
        let mut round = ProbeRound::default();

        let mut to_probe = Vec::new();
        for url in pool.unique_urls() {
            if ledger.is_suppressed(url, now, cfg.fail_threshold, cooldown) {
                tracing::debug!(target: "engine", url, "in cooldown, not probed");
                round.suppressed.insert(url.to_string());
            } else {
                to_probe.push(url.to_string());
            }
        }
        if to_probe.is_empty() {
            return round;
        }

        let timeout = cfg.probe_timeout();
        let total = to_probe.len();
        let prober = Arc::clone(&self.prober);
        let mut results = stream::iter(to_probe)
            .map(move |url| {
                let prober = Arc::clone(&prober);
                async move {
                    // enforced here too, in case a prober ignores its budget
                    let result = tokio::time::timeout(timeout, prober.probe(&url, timeout))
                        .await
                        .unwrap_or_else(|_| ProbeResult::dead(timeout.as_secs_f64()));
                    (url, result)
                }
            })
            .buffer_unordered(cfg.worker_pool_size);

        let deadline = tokio::time::sleep(cfg.run_deadline());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = results.next() => match next {
                    Some((url, result)) => {
                        crate::metrics::record_probe(&result);
                        ledger.record_probe(&url, &result, now);
                        round.results.insert(url, result);
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    round.deadline_exceeded = true;
                    tracing::warn!(
                        target: "engine",
                        finished = round.results.len(),
                        total,
                        "run deadline exceeded, abandoning remaining probes"
                    );
                    break;
                }
            }
        }

        round.abandoned = total - round.results.len();
        round
    }

    fn rank(
        &self,
        pool: &ChannelPool,
        round: &ProbeRound,
        ledger: &HealthLedger,
        now: DateTime<Utc>,
    ) -> (Vec<(ChannelIdentity, Vec<RankedSource>)>, usize) {
        let cfg = &self.config;
        let window = cfg.stale_alive_window();
        let mut stale_urls = HashSet::new();

        let ranked = pool
            .groups()
            .iter()
            .map(|group| {
                let mut list: Vec<RankedSource> = group
                    .candidates
                    .iter()
                    .filter_map(|c| {
                        let value = if let Some(result) = round.results.get(&c.url) {
                            if !result.alive {
                                return None;
                            }
                            score(&cfg.weights, c, result, ledger.get(&c.url))
                        } else if cfg.reuse_stale_alive && round.suppressed.contains(&c.url) {
                            let rec = ledger.stale_alive(&c.url, now, window)?;
                            let last = ProbeResult::alive(
                                rec.last_latency_secs
                                    .unwrap_or(cfg.probe_timeout().as_secs_f64()),
                                rec.last_quality.unwrap_or_default(),
                            );
                            stale_urls.insert(c.url.as_str());
                            score(&cfg.weights, c, &last, Some(rec))
                        } else {
                            return None;
                        };
                        Some(RankedSource {
                            url: c.url.clone(),
                            score: value,
                        })
                    })
                    .collect();
                sort_ranked(&mut list);
                (group.identity.clone(), list)
            })
            .collect();

        (ranked, stale_urls.len())
    }
}
