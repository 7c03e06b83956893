//! Shared application state for the Axum API server.

use std::sync::Arc;

use pushgate_engine::coordinator::RequestCoordinator;
use pushgate_engine::stats::MemoryStats;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RequestCoordinator>,
    pub stats: Arc<MemoryStats>,
}

impl AppState {
    pub fn new(coordinator: RequestCoordinator, stats: Arc<MemoryStats>) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            stats,
        }
    }
}
