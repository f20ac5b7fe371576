use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::ingest::RunReport;

/// Latest published run report, shared between the scheduler and handlers.
#[derive(Clone, Default)]
pub struct AppState {
    latest: Arc<RwLock<Option<RunReport>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, report: RunReport) {
        let mut guard = self.latest.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(report);
    }

    pub fn latest(&self) -> Option<RunReport> {
        self.latest
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/selection", get(selection))
        .route("/selection/{name}", get(selection_for))
        .route("/stats", get(stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn no_run_yet() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "error": "no selection run has finished yet" })),
    )
        .into_response()
}

async fn selection(State(state): State<AppState>) -> Response {
    match state.latest() {
        Some(report) => Json(report).into_response(),
        None => no_run_yet(),
    }
}

#[derive(Debug, Deserialize)]
struct ChannelQuery {
    guide_id: Option<String>,
}

/// `?guide_id=` picks one of several channels sharing a display name; without
/// it an ambiguous name answers 409 with the guide ids to choose from.
async fn selection_for(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<ChannelQuery>,
) -> Response {
    let Some(report) = state.latest() else {
        return no_run_yet();
    };
    let mut matches: Vec<_> = report
        .channels
        .into_iter()
        .filter(|c| c.identity.name == name)
        .filter(|c| q.guide_id.is_none() || c.identity.guide_id == q.guide_id)
        .collect();

    match matches.len() {
        0 => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "channel not selected", "name": name, "guide_id": q.guide_id })),
        )
            .into_response(),
        1 => Json(matches.remove(0)).into_response(),
        _ => {
            let guide_ids: Vec<_> = matches.iter().map(|c| c.identity.guide_id.clone()).collect();
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "several channels share this name, pass guide_id",
                    "name": name,
                    "guide_ids": guide_ids,
                })),
            )
                .into_response()
        }
    }
}

async fn stats(State(state): State<AppState>) -> Response {
    match state.latest() {
        Some(report) => Json(json!({
            "generated_at": report.generated_at,
            "stats": report.stats,
        }))
        .into_response(),
        None => no_run_yet(),
    }
}
