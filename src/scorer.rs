//! Source scoring.
//!
//! `score = (w_quality * tier + w_latency / (1 + latency_secs)) * protocol * reliability`
//!
//! - `tier`: 0 (Unknown) .. 4 (UHD), from the probe or the static URL hint.
//! - latency term lies in `(0, w_latency]`, so with `w_latency <= w_quality`
//!   a fast source can close at most one tier of distance.
//! - `protocol`: `1 + w_protocol` for HLS/DASH manifests, else `1`.
//! - `reliability`: `1 / (1 + consecutive_failures)` from the health record
//!   (always 1 for a source that just probed alive).
//!
//! A dead probe yields `MIN_SCORE` regardless of history.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::ConfigError;
use crate::ledger::HealthRecord;
use crate::model::{Candidate, ProbeResult, QualityHint, RankedSource};

/// Sentinel for disqualified sources.
pub const MIN_SCORE: f64 = f64::MIN;

/// Upper bound on the protocol bonus; keeps the one-tier guarantee intact
/// across the whole tier range.
pub const MAX_PROTOCOL_BONUS: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub quality: f64,
    pub latency: f64,
    pub protocol: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            quality: 100.0,
            latency: 50.0,
            protocol: 0.05,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("quality", self.quality),
            ("latency", self.latency),
            ("protocol", self.protocol),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        if self.protocol > MAX_PROTOCOL_BONUS {
            return Err(ConfigError::InvalidWeight {
                name: "protocol",
                value: self.protocol,
            });
        }
        if self.latency > self.quality {
            return Err(ConfigError::LatencyOutweighsQuality {
                latency: self.latency,
                quality: self.quality,
            });
        }
        Ok(())
    }
}

/// Pure ranking function. Identical inputs always give identical output.
pub fn score(
    weights: &ScoringWeights,
    candidate: &Candidate,
    probe: &ProbeResult,
    health: Option<&HealthRecord>,
) -> f64 {
    if !probe.alive {
        return MIN_SCORE;
    }

    let quality = match probe.quality {
        QualityHint::Unknown => candidate.meta.quality,
        q => q,
    };
    let quality_term = weights.quality * f64::from(quality.tier());

    let latency = if probe.latency_secs.is_finite() {
        probe.latency_secs.max(0.0)
    } else {
        f64::INFINITY
    };
    let latency_term = weights.latency / (1.0 + latency);

    let protocol = if candidate.meta.protocol.is_manifest() {
        1.0 + weights.protocol
    } else {
        1.0
    };

    let failures = health.map(|h| h.consecutive_failures).unwrap_or(0);
    let reliability = 1.0 / (1.0 + f64::from(failures));

    (quality_term + latency_term) * protocol * reliability
}

/// Descending score, then ascending URL.
pub fn compare_ranked(a: &RankedSource, b: &RankedSource) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.url.cmp(&b.url))
}

pub fn sort_ranked(ranked: &mut [RankedSource]) {
    ranked.sort_by(compare_ranked);
}
