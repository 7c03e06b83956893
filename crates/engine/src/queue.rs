//! Bounded job queue with non-blocking admission, and the worker pool that
//! drains it.
//!
//! Capacity bounds memory; the worker count bounds concurrent sends. Workers
//! exit once every `JobQueue` handle is dropped and the buffer is empty.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::dispatch::DispatchEngine;
use crate::job::NotificationJob;

/// A job the queue refused, handed back to the caller.
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("queue at capacity")]
    Full(NotificationJob),

    #[error("queue closed")]
    Closed(NotificationJob),
}

impl EnqueueError {
    pub fn into_job(self) -> NotificationJob {
        match self {
            EnqueueError::Full(job) | EnqueueError::Closed(job) => job,
        }
    }
}

/// Producer handle of the job queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<NotificationJob>,
}

/// Consumer half, shared by all workers.
#[derive(Debug, Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<NotificationJob>>>,
}

impl JobReceiver {
    /// Wait for the next job; `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<NotificationJob> {
        self.rx.lock().await.recv().await
    }
}

impl JobQueue {
    pub fn bounded(capacity: usize) -> (JobQueue, JobReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            JobQueue { tx },
            JobReceiver {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Place a job without waiting. A full queue rejects the job immediately.
    pub fn try_enqueue(&self, job: NotificationJob) -> Result<(), EnqueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => EnqueueError::Full(job),
            mpsc::error::TrySendError::Closed(job) => EnqueueError::Closed(job),
        })
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Fixed set of workers, each running one dispatch at a time.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(workers: usize, receiver: JobReceiver, engine: Arc<DispatchEngine>) -> Self {
        let workers = workers.max(1);
        tracing::info!(workers, "Starting dispatch workers");

        let handles = (0..workers)
            .map(|id| tokio::spawn(worker_loop(id, receiver.clone(), engine.clone())))
            .collect();

        Self { handles }
    }

    /// Wait for every worker to drain the queue and exit. Requires all
    /// `JobQueue` handles to be dropped first.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Dispatch worker panicked");
            }
        }
    }
}

async fn worker_loop(id: usize, receiver: JobReceiver, engine: Arc<DispatchEngine>) {
    while let Some(job) = receiver.recv().await {
        let job_id = job.id;
        let is_error = engine.dispatch(job).await;
        tracing::debug!(worker = id, job_id = %job_id, is_error, "Job finished");
    }
    tracing::info!(worker = id, "Closed dispatch worker");
}
