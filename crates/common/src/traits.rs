//! Collaborator seams between the dispatch core and the outside world.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PlatformConfig;
use crate::error::PushError;
use crate::types::{Credential, LogEntry, Platform, PushMessage, SendResponse};

/// A client able to deliver messages to one push platform.
#[async_trait]
pub trait PushClient: Send + Sync {
    /// Deliver one message. An `Err` means the call as a whole failed;
    /// per-recipient failures are reported inside the response.
    async fn send(&self, message: &PushMessage) -> Result<SendResponse, PushError>;
}

/// Builds platform clients from credentials.
pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        platform: Platform,
        credential: &Credential,
        config: &PlatformConfig,
    ) -> Result<Arc<dyn PushClient>, PushError>;
}

/// Fire-and-forget delivery counters.
pub trait StatsSink: Send + Sync {
    fn add_total(&self, count: u64);
    fn add_success(&self, platform: Platform, count: u64);
    fn add_failure(&self, platform: Platform, count: u64);
}

/// Receives failed entries for best-effort callback delivery. Must not block.
pub trait FeedbackSink: Send + Sync {
    fn submit(&self, entry: LogEntry);
}
