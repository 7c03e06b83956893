//! Posts failed log entries to an external callback.
//!
//! Submission never blocks the caller: entries go into a bounded queue drained
//! by a single background task. A full queue drops the entry. Each entry is
//! attempted once; delivery errors are logged and forgotten.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pushgate_common::traits::FeedbackSink;
use pushgate_common::types::LogEntry;

use crate::error::NotifierError;

pub struct FeedbackDispatcher {
    tx: mpsc::Sender<LogEntry>,
}

impl FeedbackDispatcher {
    /// Start the delivery task. It ends once every dispatcher handle is dropped
    /// and the queue has drained.
    pub fn spawn(
        url: String,
        timeout: Duration,
        capacity: usize,
    ) -> Result<(Self, JoinHandle<()>), NotifierError> {
        let client = Client::builder().timeout(timeout).build()?;
        let (tx, rx) = mpsc::channel(capacity.max(1));

        tracing::info!(url = %url, capacity, "Starting feedback dispatcher");
        let handle = tokio::spawn(run(client, url, rx));

        Ok((Self { tx }, handle))
    }
}

impl FeedbackSink for FeedbackDispatcher {
    fn submit(&self, entry: LogEntry) {
        match self.tx.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => {
                tracing::warn!(
                    recipient = %entry.recipient,
                    "Feedback queue full, dropping entry"
                );
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                tracing::warn!(
                    recipient = %entry.recipient,
                    "Feedback dispatcher stopped, dropping entry"
                );
            }
        }
    }
}

async fn run(client: Client, url: String, mut rx: mpsc::Receiver<LogEntry>) {
    while let Some(entry) = rx.recv().await {
        if let Err(e) = deliver(&client, &url, &entry).await {
            tracing::error!(
                recipient = %entry.recipient,
                error = %e,
                "Failed to send feedback"
            );
        }
    }
    tracing::info!("Feedback dispatcher stopped");
}

async fn deliver(client: &Client, url: &str, entry: &LogEntry) -> Result<(), NotifierError> {
    let response = client
        .post(url)
        .json(entry)
        .send()
        .await
        .map_err(NotifierError::Request)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NotifierError::Status { status, body });
    }

    tracing::debug!(recipient = %entry.recipient, "Feedback delivered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::routing::post;
    use axum::{Json, Router};

    use pushgate_common::types::Platform;

    use super::*;

    type Received = Arc<Mutex<Vec<LogEntry>>>;

    async fn callback_server(status: axum::http::StatusCode) -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let store = received.clone();
        let app = Router::new().route(
            "/feedback",
            post(move |Json(entry): Json<LogEntry>| {
                let store = store.clone();
                async move {
                    store.lock().unwrap().push(entry);
                    status
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/feedback", addr), received)
    }

    #[tokio::test]
    async fn test_entries_are_posted_once() {
        let (url, received) = callback_server(axum::http::StatusCode::OK).await;
        let (dispatcher, handle) =
            FeedbackDispatcher::spawn(url, Duration::from_secs(5), 16).unwrap();

        dispatcher.submit(LogEntry::failure(Platform::Android, 3, "tok-a", "Unavailable"));
        dispatcher.submit(LogEntry::failure(Platform::Ios, 0, "tok-b", "BadDeviceToken"));
        drop(dispatcher);
        handle.await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].recipient, "tok-a");
        assert_eq!(received[0].app_id, 3);
        assert_eq!(received[1].error.as_deref(), Some("BadDeviceToken"));
    }

    #[tokio::test]
    async fn test_rejected_callback_is_not_retried() {
        let (url, received) =
            callback_server(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        let (dispatcher, handle) =
            FeedbackDispatcher::spawn(url, Duration::from_secs(5), 16).unwrap();

        dispatcher.submit(LogEntry::failure(Platform::Android, 0, "tok", "boom"));
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deliver_reports_status_and_request_errors() {
        let client = Client::builder()
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        let entry = LogEntry::failure(Platform::Android, 0, "tok", "boom");

        let (url, _) = callback_server(axum::http::StatusCode::INTERNAL_SERVER_ERROR).await;
        match deliver(&client, &url, &entry).await {
            Err(NotifierError::Status { status, .. }) => assert_eq!(status.as_u16(), 500),
            other => panic!("unexpected result: {:?}", other),
        }

        let result = deliver(&client, "http://127.0.0.1:1/feedback", &entry).await;
        assert!(matches!(result, Err(NotifierError::Request(_))));
    }

    #[tokio::test]
    async fn test_unreachable_callback_does_not_stall() {
        let (dispatcher, handle) = FeedbackDispatcher::spawn(
            "http://127.0.0.1:1/feedback".to_string(),
            Duration::from_secs(1),
            4,
        )
        .unwrap();

        for i in 0..3 {
            dispatcher.submit(LogEntry::failure(Platform::Ios, 0, format!("t{}", i), "x"));
        }
        drop(dispatcher);
        handle.await.unwrap();
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        // No task drains this queue.
        let (tx, mut rx) = mpsc::channel(1);
        let dispatcher = FeedbackDispatcher { tx };

        dispatcher.submit(LogEntry::failure(Platform::Ios, 0, "first", "x"));
        dispatcher.submit(LogEntry::failure(Platform::Ios, 0, "second", "x"));

        assert_eq!(rx.try_recv().unwrap().recipient, "first");
        assert!(rx.try_recv().is_err());
    }
}
