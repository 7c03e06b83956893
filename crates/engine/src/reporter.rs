//! Terminal outcome recording shared by the coordinator and the workers.

use std::sync::Arc;

use pushgate_common::traits::{FeedbackSink, StatsSink};
use pushgate_common::types::LogEntry;

use crate::job::NotificationJob;

/// Routes each terminal log entry to the access log, the statistics sink and
/// either the job's batch sink (sync) or the feedback callback (async).
pub struct Reporter {
    stats: Arc<dyn StatsSink>,
    feedback: Option<Arc<dyn FeedbackSink>>,
}

impl Reporter {
    pub fn new(stats: Arc<dyn StatsSink>, feedback: Option<Arc<dyn FeedbackSink>>) -> Self {
        Self { stats, feedback }
    }

    pub fn record(&self, job: &NotificationJob, entry: LogEntry) {
        if entry.is_failure() {
            tracing::warn!(
                job_id = %job.id,
                app_id = job.app_id,
                platform = %entry.platform,
                recipient = %entry.recipient,
                error = entry.error.as_deref().unwrap_or_default(),
                "Push failed"
            );
            self.stats.add_failure(entry.platform, 1);
        } else {
            tracing::info!(
                job_id = %job.id,
                app_id = job.app_id,
                platform = %entry.platform,
                recipient = %entry.recipient,
                "Push succeeded"
            );
            self.stats.add_success(entry.platform, 1);
        }

        match job.sink() {
            Some(sink) => sink.push(entry),
            None => {
                if let (true, Some(feedback)) = (entry.is_failure(), &self.feedback) {
                    feedback.submit(entry);
                }
            }
        }
    }

    /// Record a failure with the same reason for every recipient of the job.
    pub fn fail_all(&self, job: &NotificationJob, reason: &str) {
        for recipient in job.recipients() {
            self.record(
                job,
                LogEntry::failure(job.platform, job.app_id, recipient, reason),
            );
        }
    }

    pub fn add_total(&self, count: u64) {
        self.stats.add_total(count);
    }
}
