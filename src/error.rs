// src/error.rs
use thiserror::Error;

/// Configuration invariant violations. Always fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("worker_pool_size must be at least 1")]
    ZeroWorkerPool,
    #[error("probe_timeout_ms must be greater than zero")]
    ZeroProbeTimeout,
    #[error("run_deadline_secs must be greater than zero")]
    ZeroRunDeadline,
    #[error("fail_threshold must be at least 1")]
    ZeroFailThreshold,
    #[error("primary_cap must be at least 1")]
    ZeroPrimaryCap,
    #[error("scoring weight `{name}` must be finite and non-negative (got {value})")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("latency weight ({latency}) must not exceed quality weight ({quality})")]
    LatencyOutweighsQuality { latency: f64, quality: f64 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// No candidates were supplied; distinct from "every channel failed".
    #[error("no candidates supplied")]
    EmptyInput,
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}
