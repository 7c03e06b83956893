//! Startup wiring of the dispatch core.

use std::sync::Arc;

use pushgate_common::config::AppConfig;
use pushgate_common::traits::{ClientFactory, FeedbackSink, StatsSink};

use crate::blacklist::TokenFilter;
use crate::coordinator::RequestCoordinator;
use crate::dispatch::DispatchEngine;
use crate::queue::{JobQueue, WorkerPool};
use crate::registry::ClientRegistry;
use crate::reporter::Reporter;

/// Collaborators the core is built around.
pub struct Collaborators {
    pub factory: Arc<dyn ClientFactory>,
    pub filter: Arc<dyn TokenFilter>,
    pub stats: Arc<dyn StatsSink>,
    pub feedback: Option<Arc<dyn FeedbackSink>>,
}

/// Build the registry, start the workers and return the coordinator.
///
/// Dropping the coordinator closes the queue; `WorkerPool::join` then waits for
/// the backlog to drain.
pub async fn start(
    config: &AppConfig,
    collaborators: Collaborators,
) -> (RequestCoordinator, WorkerPool) {
    tracing::info!(
        workers = config.worker_num,
        queue = config.queue_num,
        sync = config.sync,
        "Starting dispatch core"
    );

    let registry = Arc::new(ClientRegistry::new(config, collaborators.factory));
    let failures = registry.initialize().await;
    if failures > 0 {
        tracing::warn!(failures, "Some application clients could not be initialized");
    }

    let reporter = Arc::new(Reporter::new(collaborators.stats, collaborators.feedback));
    let engine = Arc::new(DispatchEngine::new(
        registry.clone(),
        collaborators.filter,
        reporter.clone(),
    ));

    let (queue, receiver) = JobQueue::bounded(config.queue_num);
    let workers = WorkerPool::start(config.worker_num, receiver, engine);
    let coordinator = RequestCoordinator::new(queue, registry, reporter, config.sync);

    (coordinator, workers)
}
