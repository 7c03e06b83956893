//! Batch submission route.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use pushgate_common::error::AppError;
use pushgate_common::types::{LogEntry, NotificationRequest};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub notifications: Vec<NotificationRequest>,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub success: &'static str,
    pub counts: usize,
    pub logs: Vec<LogEntry>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/push", post(push_notifications))
}

/// POST /api/push — Queue a batch of notifications.
///
/// In sync mode the response waits for every notification to finish, and a
/// client that disconnects first cancels the jobs that have not started.
async fn push_notifications(
    State(state): State<AppState>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>, AppError> {
    if request.notifications.is_empty() {
        return Err(AppError::Validation(
            "notifications field is empty".to_string(),
        ));
    }

    let cancel = CancellationToken::new();
    // Dropped with this future when the client goes away.
    let guard = state
        .coordinator
        .is_sync()
        .then(|| cancel.clone().drop_guard());

    let report = state
        .coordinator
        .submit(request.notifications, cancel)
        .await;

    if let Some(guard) = guard {
        guard.disarm();
    }

    Ok(Json(PushResponse {
        success: "ok",
        counts: report.count,
        logs: report.logs,
    }))
}
