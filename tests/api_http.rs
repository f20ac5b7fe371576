// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - GET /selection, /selection/{name}, /stats before and after a publish
// - same display name under two guide ids, picked with ?guide_id=

use axum::{
    body::{self, Body},
    Router,
};
use chrono::{TimeZone, Utc};
use http::{Request, StatusCode};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use stream_curator::api::{self, AppState};
use stream_curator::ingest::RunReport;
use stream_curator::{ChannelIdentity, ChannelSelection, RankedSource, RunStats, Selection};

const BODY_LIMIT: usize = 1024 * 1024;

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, String::from_utf8(bytes).expect("utf8"))
}

fn sample_report() -> RunReport {
    RunReport {
        generated_at: Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap(),
        stats: RunStats {
            candidates_seen: 3,
            channels_total: 1,
            channels_selected: 1,
            ..Default::default()
        },
        channels: vec![ChannelSelection {
            identity: ChannelIdentity::new("CCTV-1").with_guide_id("cctv1"),
            selection: Selection {
                primary: vec![RankedSource {
                    url: "http://a.test/1.m3u8".into(),
                    score: 350.5,
                }],
                backup: vec![],
            },
        }],
    }
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = get(api::router(AppState::new()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.trim(), "ok");
}

#[tokio::test]
async fn data_routes_are_unavailable_before_first_run() {
    let state = AppState::new();
    for uri in ["/selection", "/stats", "/selection/CCTV-1"] {
        let (status, body) = get(api::router(state.clone()), uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        let v: Json = serde_json::from_str(&body).unwrap();
        assert!(v.get("error").is_some());
    }
}

#[tokio::test]
async fn published_report_is_served() {
    let state = AppState::new();
    state.publish(sample_report());

    let (status, body) = get(api::router(state.clone()), "/selection").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["channels"][0]["identity"]["name"], "CCTV-1");
    assert_eq!(
        v["channels"][0]["selection"]["primary"][0]["url"],
        "http://a.test/1.m3u8"
    );

    let (status, body) = get(api::router(state.clone()), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["stats"]["candidates_seen"], 3);
    assert_eq!(v["stats"]["channels_selected"], 1);

    let (status, body) = get(api::router(state.clone()), "/selection/CCTV-1").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["identity"]["guide_id"], "cctv1");

    let (status, _) = get(api::router(state), "/selection/Unknown").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn channel(name: &str, guide_id: &str, url: &str) -> ChannelSelection {
    ChannelSelection {
        identity: ChannelIdentity::new(name).with_guide_id(guide_id),
        selection: Selection {
            primary: vec![RankedSource {
                url: url.into(),
                score: 100.0,
            }],
            backup: vec![],
        },
    }
}

#[tokio::test]
async fn shared_name_is_resolved_by_guide_id() {
    let mut report = sample_report();
    report.channels = vec![
        channel("News", "news.east", "http://east.test/live"),
        channel("News", "news.west", "http://west.test/live"),
    ];
    let state = AppState::new();
    state.publish(report);

    let (status, body) = get(api::router(state.clone()), "/selection/News?guide_id=news.west").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["selection"]["primary"][0]["url"], "http://west.test/live");

    let (status, body) = get(api::router(state.clone()), "/selection/News").await;
    assert_eq!(status, StatusCode::CONFLICT);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["guide_ids"], serde_json::json!(["news.east", "news.west"]));

    let (status, _) = get(api::router(state), "/selection/News?guide_id=news.north").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
