//! # Health Ledger
//! Per-URL probe history that survives across runs.
//!
//! A URL (not a channel) is the unit of memory. Records are created on first
//! observation, updated after every probe and never removed on the hot path;
//! `prune` is an optional maintenance step.
//!
//! Persistence is a flat JSON object `url -> record`. A missing or corrupt
//! snapshot degrades to an empty ledger with a warning.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::fs;

use crate::model::{ProbeResult, QualityHint};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HealthRecord {
    pub consecutive_failures: u32,
    pub last_checked_at: DateTime<Utc>,
    pub last_alive: bool,
    /// Last time a probe succeeded. Feeds stale-alive reuse only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alive_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_latency_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_quality: Option<QualityHint>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthLedger {
    records: BTreeMap<String, HealthRecord>,
}

impl HealthLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means "never probed".
    pub fn get(&self, url: &str) -> Option<&HealthRecord> {
        self.records.get(url)
    }

    /// True iff the URL has failed at least `fail_threshold` times in a row and
    /// was last checked less than `cooldown` ago.
    pub fn is_suppressed(
        &self,
        url: &str,
        now: DateTime<Utc>,
        fail_threshold: u32,
        cooldown: Duration,
    ) -> bool {
        match self.records.get(url) {
            Some(rec) => {
                rec.consecutive_failures >= fail_threshold
                    && now.signed_duration_since(rec.last_checked_at) < cooldown
            }
            None => false,
        }
    }

    /// Fold one probe outcome into the record for `url`.
    pub fn record(&mut self, url: &str, alive: bool, now: DateTime<Utc>) {
        let rec = self.records.entry(url.to_string()).or_default();
        if alive {
            rec.consecutive_failures = 0;
            rec.last_alive_at = Some(rec.last_alive_at.map_or(now, |t| t.max(now)));
        } else {
            rec.consecutive_failures = rec.consecutive_failures.saturating_add(1);
        }
        // never move backwards, even if the caller's clock does
        rec.last_checked_at = rec.last_checked_at.max(now);
        rec.last_alive = alive;
    }

    /// `record` plus the observed latency/quality of a successful probe.
    pub fn record_probe(&mut self, url: &str, probe: &ProbeResult, now: DateTime<Utc>) {
        self.record(url, probe.alive, now);
        if probe.alive {
            if let Some(rec) = self.records.get_mut(url) {
                rec.last_latency_secs = Some(probe.latency_secs);
                rec.last_quality = Some(probe.quality);
            }
        }
    }

    /// Record of a suppressed URL whose last success is within `window`.
    pub fn stale_alive(
        &self,
        url: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Option<&HealthRecord> {
        self.records.get(url).filter(|rec| {
            rec.last_alive_at
                .is_some_and(|t| now.signed_duration_since(t) <= window)
        })
    }

    /// Drop records for URLs outside `keep`. Returns how many were removed.
    pub fn prune<'a, I>(&mut self, keep: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: HashSet<&str> = keep.into_iter().collect();
        let before = self.records.len();
        self.records.retain(|url, _| keep.contains(url.as_str()));
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HealthRecord)> {
        self.records.iter()
    }

    /// Serialize the whole ledger. Keys are sorted, so output is stable.
    pub fn snapshot(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(&self.records)
    }

    /// Deserialize a snapshot, falling back to an empty ledger on any error.
    pub fn load(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        match serde_json::from_slice::<BTreeMap<String, HealthRecord>>(bytes) {
            Ok(records) => Self { records },
            Err(e) => {
                tracing::warn!(error = %e, "corrupt ledger snapshot, starting empty");
                Self::default()
            }
        }
    }

    /// Read a snapshot from disk. A missing file is a normal first run.
    pub async fn load_from_path(path: &Path) -> Self {
        match fs::read(path).await {
            Ok(bytes) => {
                let ledger = Self::load(&bytes);
                tracing::debug!(path = %path.display(), records = ledger.len(), "ledger loaded");
                ledger
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no ledger snapshot yet, starting empty");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ledger unreadable, starting empty");
                Self::default()
            }
        }
    }

    /// Write the snapshot via a temp file + rename.
    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating ledger dir {}", dir.display()))?;
        }
        let bytes = self.snapshot().context("serializing ledger")?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("renaming ledger into {}", path.display()))?;
        Ok(())
    }
}
