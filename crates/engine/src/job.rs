//! Notification jobs and the per-batch log sink.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pushgate_common::types::{
    Credential, LogEntry, MessagePayload, NotificationRequest, Platform, PushMessage,
};

use crate::error::DispatchError;

/// Maximum tokens per Android send.
pub const MAX_ANDROID_TOKENS: usize = 1000;

/// Maximum tokens per iOS send.
pub const MAX_IOS_TOKENS: usize = 100;

/// One logical push request travelling through the queue.
#[derive(Debug)]
pub struct NotificationJob {
    pub id: Uuid,
    pub platform: Platform,
    /// Narrowed to the failed tokens on each retry.
    pub tokens: Vec<String>,
    pub to: Option<String>,
    pub condition: Option<String>,
    pub app_id: u32,
    pub retry: u32,
    pub development: bool,
    pub credential: Option<Credential>,
    pub payload: MessagePayload,
    pub cancel: CancellationToken,
    sink: Option<LogSink>,
}

impl NotificationJob {
    pub fn from_request(request: NotificationRequest, cancel: CancellationToken) -> Self {
        let credential = request.credential_override();
        Self {
            id: Uuid::new_v4(),
            platform: request.platform,
            tokens: request.tokens,
            to: request.to.filter(|to| !to.is_empty()),
            condition: request.condition.filter(|c| !c.is_empty()),
            app_id: request.app_id,
            retry: request.retry,
            development: request.development,
            credential,
            payload: request.payload,
            cancel,
            sink: None,
        }
    }

    /// Attach the synchronous batch sink. The job holds it until dropped.
    pub fn with_sink(mut self, sink: LogSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn sink(&self) -> Option<&LogSink> {
        self.sink.as_ref()
    }

    /// Topic name, device-group key or condition addressed instead of tokens.
    pub fn target(&self) -> Option<&str> {
        self.to.as_deref().or(self.condition.as_deref())
    }

    /// Every recipient that must end with one terminal log entry.
    pub fn recipients(&self) -> Vec<String> {
        let mut recipients = self.tokens.clone();
        if let Some(target) = self.target() {
            recipients.push(target.to_string());
        }
        recipients
    }

    pub fn recipient_count(&self) -> usize {
        self.tokens.len() + usize::from(self.target().is_some())
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.tokens.is_empty() && self.target().is_none() {
            return Err(DispatchError::InvalidMessage(
                "the message must specify at least one registration ID".to_string(),
            ));
        }
        if !self.tokens.is_empty() && self.target().is_some() {
            return Err(DispatchError::InvalidMessage(
                "tokens and a topic or condition target are mutually exclusive".to_string(),
            ));
        }
        let limit = match self.platform {
            Platform::Android => MAX_ANDROID_TOKENS,
            Platform::Ios => MAX_IOS_TOKENS,
        };
        if self.tokens.len() > limit {
            return Err(DispatchError::InvalidMessage(format!(
                "the message may specify at most {} tokens",
                limit
            )));
        }
        Ok(())
    }

    /// Build the message for the current attempt.
    pub fn to_message(&self) -> PushMessage {
        PushMessage {
            platform: self.platform,
            tokens: self.tokens.clone(),
            to: self.to.clone(),
            condition: self.condition.clone(),
            development: self.development,
            payload: self.payload.clone(),
        }
    }
}

/// Shared, ordered sink for one synchronous batch.
///
/// Every job of the batch holds a clone; the batch is complete once all clones
/// are dropped and the collector drains.
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: mpsc::UnboundedSender<LogEntry>,
}

impl LogSink {
    pub fn channel() -> (LogSink, LogCollector) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LogSink { tx }, LogCollector { rx })
    }

    pub fn push(&self, entry: LogEntry) {
        // The collector only goes away if the submitting request was dropped.
        let _ = self.tx.send(entry);
    }
}

/// Receiving half of a `LogSink`.
#[derive(Debug)]
pub struct LogCollector {
    rx: mpsc::UnboundedReceiver<LogEntry>,
}

impl LogCollector {
    /// Wait until every sink clone is dropped, returning entries in arrival order.
    pub async fn collect(mut self) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        while let Some(entry) = self.rx.recv().await {
            entries.push(entry);
        }
        entries
    }
}
