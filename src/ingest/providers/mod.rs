// src/ingest/providers/mod.rs
pub mod file;
pub mod http;

use anyhow::Result;
use std::time::Duration;

use crate::config::SourceSpec;
use crate::ingest::types::PlaylistProvider;

pub use file::FileProvider;
pub use http::HttpProvider;

/// Build one provider per configured source, in config order.
pub fn build_providers(
    sources: &[SourceSpec],
    fetch_timeout: Duration,
) -> Result<Vec<Box<dyn PlaylistProvider>>> {
    let mut out: Vec<Box<dyn PlaylistProvider>> = Vec::with_capacity(sources.len());
    for (i, s) in sources.iter().enumerate() {
        let name = s.name.clone().unwrap_or_else(|| format!("source-{i}"));
        match (&s.file, &s.url) {
            (Some(path), None) => out.push(Box::new(FileProvider::new(name, path.clone()))),
            (None, Some(url)) => {
                out.push(Box::new(HttpProvider::new(name, url.clone(), fetch_timeout)?))
            }
            _ => anyhow::bail!("source `{name}` must set exactly one of `file` or `url`"),
        }
    }
    Ok(out)
}
