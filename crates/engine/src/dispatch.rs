//! Delivery of a single notification with bounded retries.
//!
//! Each job runs a small state machine:
//!
//! ```text
//! Sending -> Classifying -> Done
//!                        -> Retrying -> Sending
//!                                    -> Done
//! ```
//!
//! Only per-recipient delivery failures are retried, and only for the recipients
//! that failed in the immediately preceding attempt. Configuration, validation
//! and transport failures end the job at once.

use std::sync::Arc;

use pushgate_common::types::{LogEntry, SendResponse};

use crate::blacklist::{FilterVerdict, TokenFilter};
use crate::error::DispatchError;
use crate::job::NotificationJob;
use crate::registry::ClientRegistry;
use crate::reporter::Reporter;

const DEVICE_GROUP_FAILURE: &str = "device group: partial success or all fails";
const MISSING_RESULT: &str = "no result returned for token";

/// A recipient that failed the latest attempt.
#[derive(Debug, Clone, PartialEq)]
struct Failure {
    recipient: String,
    reason: String,
    /// Topic, condition or device-group target rather than a device token.
    target: bool,
}

enum Step {
    Sending,
    Classifying(SendResponse),
    Retrying(Vec<Failure>),
    Done(bool),
}

pub struct DispatchEngine {
    registry: Arc<ClientRegistry>,
    filter: Arc<dyn TokenFilter>,
    reporter: Arc<Reporter>,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<ClientRegistry>,
        filter: Arc<dyn TokenFilter>,
        reporter: Arc<Reporter>,
    ) -> Self {
        Self {
            registry,
            filter,
            reporter,
        }
    }

    /// Deliver one notification, retrying failed recipients up to the ceiling.
    ///
    /// Returns `true` if at least one recipient ended in failure. Blacklisted
    /// tokens are never sent and count as neither success nor failure.
    pub async fn dispatch(&self, mut job: NotificationJob) -> bool {
        let screened_out = self.screen(&mut job).await;

        if job.cancel.is_cancelled() {
            tracing::debug!(job_id = %job.id, "Request cancelled before sending, skipping");
            return false;
        }

        if screened_out > 0 && job.recipient_count() == 0 {
            tracing::debug!(job_id = %job.id, "Every token is blacklisted, nothing to send");
            return false;
        }

        if let Err(e) = job.validate() {
            self.reporter.fail_all(&job, &e.to_string());
            return true;
        }

        let ceiling = self.retry_ceiling(&job);
        let mut attempts = 0u32;
        let mut step = Step::Sending;

        loop {
            step = match step {
                Step::Sending => {
                    attempts += 1;
                    match self.send_once(&job).await {
                        Ok(response) => Step::Classifying(response),
                        Err(e) => {
                            tracing::error!(
                                job_id = %job.id,
                                app_id = job.app_id,
                                attempt = attempts,
                                error = %e,
                                "Push send failed"
                            );
                            self.reporter.fail_all(&job, &e.to_string());
                            Step::Done(true)
                        }
                    }
                }
                Step::Classifying(response) => {
                    let failures = self.classify(&job, response).await;
                    if failures.is_empty() {
                        Step::Done(false)
                    } else {
                        Step::Retrying(failures)
                    }
                }
                Step::Retrying(failures) => {
                    if attempts < ceiling {
                        tracing::debug!(
                            job_id = %job.id,
                            attempt = attempts,
                            ceiling,
                            failed = failures.len(),
                            "Retrying failed recipients"
                        );
                        narrow(&mut job, &failures);
                        Step::Sending
                    } else {
                        for failure in failures {
                            self.reporter.record(
                                &job,
                                LogEntry::failure(
                                    job.platform,
                                    job.app_id,
                                    failure.recipient,
                                    failure.reason,
                                ),
                            );
                        }
                        Step::Done(true)
                    }
                }
                Step::Done(is_error) => return is_error,
            };
        }
    }

    /// Total attempts allowed for the job, including the first send.
    fn retry_ceiling(&self, job: &NotificationJob) -> u32 {
        let global = self.registry.max_retry(job.platform);
        if job.retry > 0 {
            job.retry.min(global)
        } else {
            global
        }
    }

    /// Drop blacklisted tokens and detect development tokens. Returns the number
    /// of tokens dropped. Filter errors let the token through, and after the
    /// first one the rest of the job is sent unscreened.
    async fn screen(&self, job: &mut NotificationJob) -> usize {
        let tokens = std::mem::take(&mut job.tokens);
        let total = tokens.len();
        let mut allowed = Vec::with_capacity(total);
        let mut store_up = true;

        for token in tokens {
            if !store_up {
                allowed.push(token);
                continue;
            }

            let verdict = match self.filter.is_development(&token).await {
                Ok(true) => {
                    tracing::warn!(job_id = %job.id, token = %token, "Detected dev token, forcing development");
                    job.development = true;
                    allowed.push(token);
                    continue;
                }
                Ok(false) => self.filter.screen(&token).await,
                Err(e) => FilterVerdict::Unknown(e),
            };

            match verdict {
                FilterVerdict::Blacklisted => {
                    tracing::warn!(job_id = %job.id, token = %token, "Skipping blacklisted token");
                }
                FilterVerdict::Clear => allowed.push(token),
                FilterVerdict::Unknown(e) => {
                    tracing::warn!(
                        job_id = %job.id,
                        error = %e,
                        "Token filter unavailable, sending remaining tokens unscreened"
                    );
                    store_up = false;
                    allowed.push(token);
                }
            }
        }

        job.tokens = allowed;
        total - job.tokens.len()
    }

    async fn send_once(&self, job: &NotificationJob) -> Result<SendResponse, DispatchError> {
        let client = self.registry.resolve(job).await?;
        let message = job.to_message();
        Ok(client.send(&message).await?)
    }

    /// Record successes and collect this attempt's failures. Tokens reported as
    /// unregistered are blacklisted here, whatever the retry outcome.
    async fn classify(&self, job: &NotificationJob, response: SendResponse) -> Vec<Failure> {
        let mut failures = Vec::new();

        match response {
            SendResponse::Tokens { results } => {
                for (index, token) in job.tokens.iter().enumerate() {
                    let error = match results.get(index) {
                        Some(result) => result.error.clone(),
                        None => Some(MISSING_RESULT.to_string()),
                    };
                    match error {
                        None => self.reporter.record(
                            job,
                            LogEntry::success(job.platform, job.app_id, token.clone()),
                        ),
                        Some(reason) => {
                            if is_unregistered(&reason) {
                                self.blacklist(job, token).await;
                            }
                            failures.push(Failure {
                                recipient: token.clone(),
                                reason,
                                target: false,
                            });
                        }
                    }
                }
                if let Some(target) = job.target() {
                    // A token-style reply to a target-addressed message.
                    match results.first().and_then(|r| r.error.clone()) {
                        None if !results.is_empty() => self.reporter.record(
                            job,
                            LogEntry::success(job.platform, job.app_id, target),
                        ),
                        error => failures.push(Failure {
                            recipient: target.to_string(),
                            reason: error.unwrap_or_else(|| MISSING_RESULT.to_string()),
                            target: true,
                        }),
                    }
                }
            }
            SendResponse::Topic { message_id, error } => {
                tracing::debug!(
                    job_id = %job.id,
                    recipient = job.target().unwrap_or_default(),
                    "Sent topic message"
                );
                let outcome = match message_id {
                    Some(_) => Ok(()),
                    None => Err(error.unwrap_or_else(|| "topic message not accepted".to_string())),
                };
                self.apply_to_all(job, outcome, &mut failures);
            }
            SendResponse::DeviceGroup {
                success,
                failure,
                failed_registration_ids,
            } => {
                tracing::debug!(
                    job_id = %job.id,
                    success,
                    failure,
                    "Sent device group message"
                );
                let outcome = if failed_registration_ids.is_empty() {
                    Ok(())
                } else {
                    Err(DEVICE_GROUP_FAILURE.to_string())
                };
                self.apply_to_all(job, outcome, &mut failures);
            }
        }

        failures
    }

    /// Apply one message-level outcome to every recipient of the job.
    fn apply_to_all(
        &self,
        job: &NotificationJob,
        outcome: Result<(), String>,
        failures: &mut Vec<Failure>,
    ) {
        for recipient in job.recipients() {
            match &outcome {
                Ok(()) => self
                    .reporter
                    .record(job, LogEntry::success(job.platform, job.app_id, recipient)),
                Err(reason) => failures.push(Failure {
                    target: job.target() == Some(recipient.as_str()),
                    recipient,
                    reason: reason.clone(),
                }),
            }
        }
    }

    async fn blacklist(&self, job: &NotificationJob, token: &str) {
        tracing::warn!(job_id = %job.id, token = %token, "Detected unregistered device token");
        if let Err(e) = self.filter.mark(token).await {
            tracing::warn!(job_id = %job.id, error = %e, "Blacklist unregistered device token failed");
        }
    }
}

/// Keep only the recipients that failed the previous attempt.
fn narrow(job: &mut NotificationJob, failures: &[Failure]) {
    job.tokens = failures
        .iter()
        .filter(|f| !f.target)
        .map(|f| f.recipient.clone())
        .collect();
    if !failures.iter().any(|f| f.target) {
        job.to = None;
        job.condition = None;
    }
}

/// Whether a platform error marks the token as permanently invalid.
fn is_unregistered(error: &str) -> bool {
    let error = error.to_ascii_lowercase();
    error.contains("unregistered")
        || error.contains("notregistered")
        || error.contains("not registered")
}
