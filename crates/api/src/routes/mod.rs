pub mod health;
pub mod push;
pub mod stats;

use axum::Router;

use pushgate_common::error::AppError;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(push::router())
        .merge(stats::router())
        .fallback(|| async { AppError::NotFound("route not found".to_string()) })
        .with_state(state)
}
