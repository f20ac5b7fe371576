// src/ingest/providers/http.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use std::time::Duration;

use crate::ingest::m3u::parse_playlist;
use crate::ingest::types::PlaylistProvider;
use crate::model::Candidate;

/// Downloads an M3U playlist over HTTP(S).
pub struct HttpProvider {
    name: String,
    url: String,
    client: Client,
}

impl HttpProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building playlist http client")?;
        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl PlaylistProvider for HttpProvider {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
        let body = self
            .client
            .get(&self.url)
            .header(USER_AGENT, "Mozilla/5.0")
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?
            .error_for_status()
            .with_context(|| format!("playlist {} non-2xx", self.url))?
            .bytes()
            .await
            .context("playlist http body")?;
        Ok(parse_playlist(&String::from_utf8_lossy(&body)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
