// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod metrics;
pub mod model;
pub mod probe;
pub mod scorer;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::engine::{RunOutcome, RunStats, SelectionEngine};
pub use crate::error::{ConfigError, EngineError};
pub use crate::ledger::{HealthLedger, HealthRecord};
pub use crate::model::{
    Candidate, ChannelIdentity, ChannelSelection, ProbeResult, QualityHint, RankedSource,
    Selection,
};
pub use crate::probe::{HttpProber, Prober};
pub use crate::scorer::ScoringWeights;
