//! Delivery statistics.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use pushgate_engine::stats::StatsSnapshot;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/stat/app", get(app_stats))
}

/// GET /api/stat/app — Counters since process start.
async fn app_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
