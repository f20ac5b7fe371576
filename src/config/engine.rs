// src/config/engine.rs
//! Immutable engine configuration.
//!
//! TOML shape (every key optional, defaults shown):
//! ```toml
//! probe_timeout_ms = 5000
//! run_deadline_secs = 300
//! worker_pool_size = 24
//! fail_threshold = 3
//! cooldown_secs = 86400
//! primary_cap = 5
//! backup_cap = 5
//! reuse_stale_alive = false
//! stale_alive_window_secs = 86400
//!
//! [weights]
//! quality = 100.0
//! latency = 50.0
//! protocol = 0.05
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::scorer::ScoringWeights;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock budget of a single probe, measured from task start.
    pub probe_timeout_ms: u64,
    /// Overall budget for the probing phase of one run.
    pub run_deadline_secs: u64,
    /// Maximum number of probes in flight.
    pub worker_pool_size: usize,
    /// Consecutive failures after which a URL enters cooldown.
    pub fail_threshold: u32,
    pub cooldown_secs: u64,
    pub primary_cap: usize,
    pub backup_cap: usize,
    pub weights: ScoringWeights,
    /// Rank suppressed URLs from their last successful probe instead of
    /// dropping them. Off by default.
    pub reuse_stale_alive: bool,
    /// How old a last success may be and still count for stale reuse.
    pub stale_alive_window_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            run_deadline_secs: 300,
            worker_pool_size: 24,
            fail_threshold: 3,
            cooldown_secs: 24 * 3600,
            primary_cap: 5,
            backup_cap: 5,
            weights: ScoringWeights::default(),
            reuse_stale_alive: false,
            stale_alive_window_secs: 24 * 3600,
        }
    }
}

impl EngineConfig {
    /// Check every invariant. Nothing is coerced to a default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_pool_size == 0 {
            return Err(ConfigError::ZeroWorkerPool);
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }
        if self.run_deadline_secs == 0 {
            return Err(ConfigError::ZeroRunDeadline);
        }
        if self.fail_threshold == 0 {
            return Err(ConfigError::ZeroFailThreshold);
        }
        if self.primary_cap == 0 {
            return Err(ConfigError::ZeroPrimaryCap);
        }
        self.weights.validate()
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }

    pub fn cooldown(&self) -> chrono::Duration {
        secs_to_chrono(self.cooldown_secs)
    }

    pub fn stale_alive_window(&self) -> chrono::Duration {
        secs_to_chrono(self.stale_alive_window_secs)
    }
}

/// Saturates at the largest span chrono can represent.
fn secs_to_chrono(secs: u64) -> chrono::Duration {
    const MAX_SECS: i64 = i64::MAX / 1_000;
    chrono::Duration::seconds(i64::try_from(secs).map_or(MAX_SECS, |s| s.min(MAX_SECS)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.probe_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.cooldown(), chrono::Duration::hours(24));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: EngineConfig = toml::from_str(
            r#"
worker_pool_size = 8
primary_cap = 2

[weights]
latency = 10.0
"#,
        )
        .unwrap();
        assert_eq!(cfg.worker_pool_size, 8);
        assert_eq!(cfg.primary_cap, 2);
        assert_eq!(cfg.backup_cap, 5);
        assert!((cfg.weights.latency - 10.0).abs() < f64::EPSILON);
        assert!((cfg.weights.quality - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invariants_fail_fast() {
        let zero_pool = EngineConfig {
            worker_pool_size: 0,
            ..Default::default()
        };
        assert_eq!(zero_pool.validate(), Err(ConfigError::ZeroWorkerPool));

        let zero_cap = EngineConfig {
            primary_cap: 0,
            ..Default::default()
        };
        assert_eq!(zero_cap.validate(), Err(ConfigError::ZeroPrimaryCap));

        let zero_threshold = EngineConfig {
            fail_threshold: 0,
            ..Default::default()
        };
        assert_eq!(zero_threshold.validate(), Err(ConfigError::ZeroFailThreshold));
    }

    #[test]
    fn negative_cap_is_rejected_at_parse_time() {
        let parsed: Result<EngineConfig, _> = toml::from_str("backup_cap = -1");
        assert!(parsed.is_err());
    }
}
