//! Batch admission and sync/async completion.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use pushgate_common::types::{LogEntry, NotificationRequest};

use crate::job::{LogSink, NotificationJob};
use crate::queue::JobQueue;
use crate::registry::ClientRegistry;
use crate::reporter::Reporter;

/// Result of one batch submission.
#[derive(Debug, Default, Serialize)]
pub struct SubmitReport {
    /// Recipients of every notification admitted past the platform filter.
    pub count: usize,
    /// Terminal entries in arrival order; empty in async mode.
    pub logs: Vec<LogEntry>,
}

pub struct RequestCoordinator {
    queue: JobQueue,
    registry: Arc<ClientRegistry>,
    reporter: Arc<Reporter>,
    sync: bool,
}

impl RequestCoordinator {
    pub fn new(
        queue: JobQueue,
        registry: Arc<ClientRegistry>,
        reporter: Arc<Reporter>,
        sync: bool,
    ) -> Self {
        Self {
            queue,
            registry,
            reporter,
            sync,
        }
    }

    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// Enqueue every notification of the batch.
    ///
    /// Notifications for unknown applications or disabled platforms are
    /// skipped silently. A notification the queue cannot take gets a failure
    /// entry per recipient. In sync mode this waits until every admitted
    /// notification has completed.
    pub async fn submit(
        &self,
        batch: Vec<NotificationRequest>,
        cancel: CancellationToken,
    ) -> SubmitReport {
        let (sink, collector) = if self.sync {
            let (sink, collector) = LogSink::channel();
            (Some(sink), Some(collector))
        } else {
            (None, None)
        };

        let mut count = 0;
        for request in batch {
            match self.registry.platform_enabled(request.app_id, request.platform) {
                None => {
                    tracing::warn!(app_id = request.app_id, "Missing config for application, skip queuing");
                    continue;
                }
                Some(false) => {
                    tracing::debug!(
                        app_id = request.app_id,
                        platform = %request.platform,
                        "Platform disabled for application, skip queuing"
                    );
                    continue;
                }
                Some(true) => {}
            }

            let mut job = NotificationJob::from_request(request, cancel.clone());
            if let Some(sink) = &sink {
                job = job.with_sink(sink.clone());
            }
            count += job.recipient_count();

            if let Err(e) = self.queue.try_enqueue(job) {
                let reason = e.to_string();
                let job = e.into_job();
                tracing::error!(
                    job_id = %job.id,
                    app_id = job.app_id,
                    capacity = self.queue.capacity(),
                    reason = %reason,
                    "Notification rejected"
                );
                self.reporter.fail_all(&job, &reason);
            }
        }

        self.reporter.add_total(count as u64);

        drop(sink);
        let logs = match collector {
            Some(collector) => collector.collect().await,
            None => Vec::new(),
        };

        SubmitReport { count, logs }
    }
}
