// src/config/mod.rs
pub mod app;
pub mod engine;

pub use app::{load_config_default, load_config_from, AppConfig, PathsConfig, SchedulerConfig, SourceSpec};
pub use engine::EngineConfig;
