// src/ingest/types.rs
use anyhow::Result;

use crate::model::Candidate;

/// Anything that can hand the engine a batch of `(identity, url)` candidates.
#[async_trait::async_trait]
pub trait PlaylistProvider: Send + Sync {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
}
