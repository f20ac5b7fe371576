// src/ingest/providers/file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use crate::ingest::m3u::parse_playlist;
use crate::ingest::types::PlaylistProvider;
use crate::model::Candidate;

/// Reads an M3U playlist from local disk.
pub struct FileProvider {
    name: String,
    path: PathBuf,
}

impl FileProvider {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl PlaylistProvider for FileProvider {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading playlist {}", self.path.display()))?;
        // tolerate stray non-UTF-8 bytes the way most players do
        let text = String::from_utf8_lossy(&bytes);
        Ok(parse_playlist(&text))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
