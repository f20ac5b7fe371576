//! # Probe Engine
//! Bounded-time liveness and quality check of a single URL.
//!
//! `Prober::probe` never fails: transport errors, non-success statuses and
//! timeouts all collapse to `ProbeResult::dead(timeout)`.
//!
//! HTTP strategy:
//! 1. `HEAD` the URL (redirects followed, final status governs).
//! 2. If `HEAD` is not a success, retry as a ranged `GET` (`bytes=0-1023`)
//!    and wait for the first body chunk.
//! 3. If HEAD advertised an HLS manifest, read its head within whatever is
//!    left of the budget and take the highest `RESOLUTION=` as the quality
//!    hint; otherwise fall back to URL heuristics. A slow manifest body only
//!    loses the hint, never liveness.
//!
//! Alive means a status in `200..=206` within the timeout. Latency runs from
//! the start of the probe to the headers (HEAD) or first chunk (GET), so a
//! slow failed HEAD is charged to the source.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RANGE, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::model::{ProbeResult, QualityHint};

const PROBE_USER_AGENT: &str = "Mozilla/5.0";
const PARTIAL_RANGE: &str = "bytes=0-1023";
/// Upper bound on manifest bytes read for resolution hints.
const MANIFEST_PEEK_BYTES: usize = 16 * 1024;

#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult;
}

#[derive(Debug, Error)]
enum ProbeFailure {
    #[error("status {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub fn is_alive_status(status: StatusCode) -> bool {
    (200..=206).contains(&status.as_u16())
}

pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (custom proxy, TLS roots, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Liveness part of a probe. `started` is the probe's start, so latency
    /// covers a HEAD attempt that failed before the fallback GET.
    async fn check(&self, url: &str, started: Instant) -> Result<Reached, ProbeFailure> {
        let head = self
            .client
            .head(url)
            .header(USER_AGENT, PROBE_USER_AGENT)
            .send()
            .await;

        match head {
            Ok(resp) if is_alive_status(resp.status()) => Ok(Reached {
                latency_secs: started.elapsed().as_secs_f64(),
                quality: QualityHint::Unknown,
                manifest: is_hls_content_type(resp.headers()),
            }),
            Ok(resp) => {
                tracing::trace!(url, status = %resp.status(), "HEAD rejected, trying ranged GET");
                self.ranged_get(url, started).await
            }
            Err(e) => {
                tracing::trace!(url, error = %e, "HEAD failed, trying ranged GET");
                self.ranged_get(url, started).await
            }
        }
    }

    async fn ranged_get(&self, url: &str, started: Instant) -> Result<Reached, ProbeFailure> {
        let mut resp = self
            .client
            .get(url)
            .header(USER_AGENT, PROBE_USER_AGENT)
            .header(RANGE, PARTIAL_RANGE)
            .send()
            .await?;
        let status = resp.status();
        if !is_alive_status(status) {
            return Err(ProbeFailure::Status(status));
        }
        let hls = is_hls_content_type(resp.headers());
        let first = resp.chunk().await?;
        let latency_secs = started.elapsed().as_secs_f64();

        let quality = match first {
            Some(bytes) if hls || looks_like_manifest(&bytes) => {
                manifest_quality(&String::from_utf8_lossy(&bytes))
            }
            _ => QualityHint::Unknown,
        };
        Ok(Reached {
            latency_secs,
            quality,
            manifest: false,
        })
    }

    /// Best-effort read of a manifest head. Failures only lose the hint.
    async fn peek_manifest_quality(&self, url: &str) -> QualityHint {
        let Ok(mut resp) = self
            .client
            .get(url)
            .header(USER_AGENT, PROBE_USER_AGENT)
            .send()
            .await
        else {
            return QualityHint::Unknown;
        };
        if !is_alive_status(resp.status()) {
            return QualityHint::Unknown;
        }
        let mut buf = Vec::new();
        while buf.len() < MANIFEST_PEEK_BYTES {
            match resp.chunk().await {
                Ok(Some(bytes)) => buf.extend_from_slice(&bytes),
                _ => break,
            }
        }
        manifest_quality(&String::from_utf8_lossy(&buf))
    }
}

/// A source that answered with a success status in time.
struct Reached {
    latency_secs: f64,
    quality: QualityHint,
    /// HEAD advertised an HLS playlist; its body is still unread.
    manifest: bool,
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult {
        let started = Instant::now();
        let reached = match tokio::time::timeout(timeout, self.check(url, started)).await {
            Ok(Ok(reached)) => reached,
            Ok(Err(e)) => {
                tracing::debug!(url, error = %e, "probe dead");
                return ProbeResult::dead(timeout.as_secs_f64());
            }
            Err(_) => {
                tracing::debug!(url, timeout_ms = timeout.as_millis() as u64, "probe timed out");
                return ProbeResult::dead(timeout.as_secs_f64());
            }
        };

        // liveness is settled; the manifest read only gets what is left
        let quality = if reached.manifest {
            let remaining = timeout.saturating_sub(started.elapsed());
            tokio::time::timeout(remaining, self.peek_manifest_quality(url))
                .await
                .unwrap_or_else(|_| {
                    tracing::trace!(url, "manifest read ran out of budget");
                    QualityHint::Unknown
                })
        } else {
            reached.quality
        };

        let result = ProbeResult::alive(
            reached.latency_secs.min(timeout.as_secs_f64()),
            or_url_hint(quality, url),
        );
        tracing::debug!(url, latency_ms = (result.latency_secs * 1_000.0) as u64, quality = ?result.quality, "probe alive");
        result
    }
}

fn or_url_hint(quality: QualityHint, url: &str) -> QualityHint {
    match quality {
        QualityHint::Unknown => QualityHint::from_text(url),
        q => q,
    }
}

fn is_hls_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("mpegurl"))
        .unwrap_or(false)
}

fn looks_like_manifest(bytes: &[u8]) -> bool {
    bytes.starts_with(b"#EXTM3U") || bytes.starts_with(b"\xEF\xBB\xBF#EXTM3U")
}

/// Highest `RESOLUTION=WxH` advertised in an HLS master playlist.
pub fn manifest_quality(text: &str) -> QualityHint {
    static RE_RES: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)RESOLUTION=(\d+)x(\d+)").expect("resolution regex"));
    RE_RES
        .captures_iter(text)
        .filter_map(|c| c.get(2)?.as_str().parse::<u32>().ok())
        .max()
        .map(QualityHint::from_height)
        .unwrap_or(QualityHint::Unknown)
}
