// src/config/app.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::engine::EngineConfig;

pub const ENV_CONFIG_PATH: &str = "STREAM_CURATOR_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/curator.toml";
pub const DEFAULT_JSON_PATH: &str = "config/curator.json";

/// Where a playlist comes from. Exactly one of `file` / `url` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub ledger: PathBuf,
    pub playlist: PathBuf,
    pub report: PathBuf,
    /// Name rule table; `None` uses the built-in table.
    pub rules: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ledger: PathBuf::from("state/ledger.json"),
            playlist: PathBuf::from("live.m3u"),
            report: PathBuf::from("state/report.json"),
            rules: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    /// Timeout for fetching remote playlists.
    pub fetch_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 6 * 3600,
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub sources: Vec<SourceSpec>,
    pub paths: PathsConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        for (i, s) in self.sources.iter().enumerate() {
            match (&s.file, &s.url) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => return Err(anyhow!("source #{i} must set exactly one of `file` or `url`")),
            }
        }
        if self.scheduler.interval_secs == 0 {
            return Err(anyhow!("scheduler.interval_secs must be greater than zero"));
        }
        Ok(())
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $STREAM_CURATOR_CONFIG
/// 2) config/curator.toml
/// 3) config/curator.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for p in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
    }
    tracing::info!("no config file found, using defaults");
    Ok(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        // unknown extension: JSON if it looks like an object, else TOML
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_shapes_agree() {
        let toml_src = r#"
[engine]
worker_pool_size = 10

[[sources]]
name = "local"
file = "source.m3u"

[[sources]]
url = "https://example.test/list.m3u"

[paths]
ledger = "data/ledger.json"
"#;
        let json_src = r#"{
  "engine": {"worker_pool_size": 10},
  "sources": [
    {"name": "local", "file": "source.m3u"},
    {"url": "https://example.test/list.m3u"}
  ],
  "paths": {"ledger": "data/ledger.json"}
}"#;
        let a = parse_config(toml_src, "toml").unwrap();
        let b = parse_config(json_src, "json").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.engine.worker_pool_size, 10);
        assert_eq!(a.paths.playlist, PathBuf::from("live.m3u"));
        assert!(a.validate().is_ok());
    }

    #[test]
    fn source_needs_exactly_one_location() {
        let cfg = AppConfig {
            sources: vec![SourceSpec {
                name: None,
                file: Some("a.m3u".into()),
                url: Some("http://a".into()),
            }],
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_engine_section_fails_validation() {
        let cfg = parse_config("[engine]\nworker_pool_size = 0\n", "toml").unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("worker_pool_size"));
    }
}
