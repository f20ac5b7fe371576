// tests/ingest_pipeline.rs
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use stream_curator::config::{EngineConfig, PathsConfig};
use stream_curator::ingest::providers::FileProvider;
use stream_curator::ingest::rules::NameRules;
use stream_curator::ingest::types::PlaylistProvider;
use stream_curator::ingest::{collect_candidates, Cycle, RunReport};
use stream_curator::{
    Candidate, ChannelIdentity, HealthLedger, ProbeResult, Prober, QualityHint, SelectionEngine,
};

struct MockProvider(Vec<Candidate>);

#[async_trait]
impl PlaylistProvider for MockProvider {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &str {
        "MockProvider"
    }
}

struct BrokenProvider;

#[async_trait]
impl PlaylistProvider for BrokenProvider {
    async fn fetch_candidates(&self) -> Result<Vec<Candidate>> {
        Err(anyhow!("upstream returned garbage"))
    }
    fn name(&self) -> &str {
        "BrokenProvider"
    }
}

/// Every URL containing "up" is alive.
struct UpProber;

#[async_trait]
impl Prober for UpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeResult {
        if url.contains("up") {
            ProbeResult::alive(0.05, QualityHint::Hd)
        } else {
            ProbeResult::dead(timeout.as_secs_f64())
        }
    }
}

fn cand(name: &str, url: &str) -> Candidate {
    Candidate::new(ChannelIdentity::new(name), url)
}

fn paths(dir: &std::path::Path) -> PathsConfig {
    PathsConfig {
        ledger: dir.join("state/ledger.json"),
        playlist: dir.join("out/live.m3u"),
        report: dir.join("state/report.json"),
        rules: None,
    }
}

fn engine() -> SelectionEngine {
    SelectionEngine::new(EngineConfig::default(), Arc::new(UpProber)).unwrap()
}

#[tokio::test]
async fn provider_errors_are_skipped_and_order_kept() {
    let providers: Vec<Box<dyn PlaylistProvider>> = vec![
        Box::new(MockProvider(vec![cand("A", "http://up/1")])),
        Box::new(BrokenProvider),
        Box::new(MockProvider(vec![cand("B", "http://up/2"), cand("A", "http://up/3")])),
    ];
    let out = collect_candidates(&providers).await;
    let got: Vec<&str> = out.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(got, vec!["http://up/1", "http://up/2", "http://up/3"]);
}

#[tokio::test]
async fn cycle_persists_ledger_playlist_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let providers: Vec<Box<dyn PlaylistProvider>> = vec![Box::new(MockProvider(vec![
        cand("CCTV-1", "http://up/cctv1"),
        cand("CCTV-1", "http://down/cctv1"),
        cand("好易购物", "http://up/shop"),
        cand("Dead Channel", "http://down/x"),
    ]))];
    let cycle = Cycle::new(engine(), providers, NameRules::default_table(), paths(dir.path()));

    let report = cycle.run_once().await.unwrap().expect("a report");
    assert_eq!(report.channels.len(), 1);
    assert_eq!(report.channels[0].identity.name, "CCTV-1");
    assert_eq!(report.stats.candidates_rejected, 1);
    assert_eq!(report.stats.channels_without_source, 1);

    let playlist = fs::read_to_string(dir.path().join("out/live.m3u")).unwrap();
    assert!(playlist.starts_with("#EXTM3U\n"));
    assert!(playlist.contains("group-title=\"primary\",CCTV-1\nhttp://up/cctv1\n"));
    assert!(!playlist.contains("http://down/"));
    assert!(!playlist.contains("shop"));

    let saved: RunReport =
        serde_json::from_str(&fs::read_to_string(dir.path().join("state/report.json")).unwrap())
            .unwrap();
    assert_eq!(saved.channels, report.channels);

    let ledger = HealthLedger::load_from_path(&dir.path().join("state/ledger.json")).await;
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.get("http://down/x").unwrap().consecutive_failures, 1);
    assert!(ledger.get("http://up/shop").is_none());

    // the next cycle picks the saved ledger up
    let again = cycle.run_once().await.unwrap().unwrap();
    assert_eq!(again.channels, report.channels);
    let ledger = HealthLedger::load_from_path(&dir.path().join("state/ledger.json")).await;
    assert_eq!(ledger.get("http://down/x").unwrap().consecutive_failures, 2);
}

#[tokio::test]
async fn empty_cycle_leaves_outputs_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let providers: Vec<Box<dyn PlaylistProvider>> =
        vec![Box::new(BrokenProvider), Box::new(MockProvider(Vec::new()))];
    let cycle = Cycle::new(engine(), providers, NameRules::default(), paths(dir.path()));

    assert!(cycle.run_once().await.unwrap().is_none());
    assert!(!dir.path().join("out/live.m3u").exists());
    assert!(!dir.path().join("state/ledger.json").exists());
}

#[tokio::test]
async fn file_provider_reads_m3u() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.m3u");
    fs::write(
        &path,
        "#EXTM3U\n#EXTINF:-1 tvg-id=\"news\",News HD\nhttp://up/news.m3u8\n#EXTINF:-1,Movies\nrtmp://up/movies\n",
    )
    .unwrap();

    let provider = FileProvider::new("local", &path);
    assert_eq!(provider.name(), "local");
    let got = provider.fetch_candidates().await.unwrap();
    assert_eq!(got.len(), 2);
    assert_eq!(got[0].identity.guide_id.as_deref(), Some("news"));
    assert_eq!(got[0].meta.quality, QualityHint::Hd);
    assert_eq!(got[1].url, "rtmp://up/movies");

    let missing = FileProvider::new("gone", dir.path().join("nope.m3u"));
    assert!(missing.fetch_candidates().await.is_err());
}
