use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application ID used for requests that do not name a tenant.
pub const DEFAULT_APP_ID: u32 = 0;

/// Supported push platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
            Platform::Android => write!(f, "android"),
        }
    }
}

/// Terminal outcome of a single recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushStatus {
    SucceededPush,
    FailedPush,
}

impl std::fmt::Display for PushStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushStatus::SucceededPush => write!(f, "succeeded-push"),
            PushStatus::FailedPush => write!(f, "failed-push"),
        }
    }
}

/// Immutable record of one recipient's terminal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Device token, topic name or condition expression.
    pub recipient: String,
    pub status: PushStatus,
    pub platform: Platform,
    pub app_id: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    pub fn success(platform: Platform, app_id: u32, recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            status: PushStatus::SucceededPush,
            platform,
            app_id,
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn failure(
        platform: Platform,
        app_id: u32,
        recipient: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            status: PushStatus::FailedPush,
            platform,
            app_id,
            timestamp: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == PushStatus::FailedPush
    }
}

/// Credential used to construct a platform client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Server API key.
    ApiKey(String),
    /// Credential bundle (service account JSON, certificate reference, ...).
    Bundle(String),
}

/// Message content forwarded untouched to the platform client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,
    /// APNs topic (bundle identifier), unrelated to FCM topic messaging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apns_topic: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

/// One notification descriptor as accepted by the batch submission interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub platform: Platform,
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Topic (`/topics/...`) or device-group notification key.
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub app_id: u32,
    /// Requested retry ceiling; 0 uses the configured default.
    #[serde(default)]
    pub retry: u32,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub credentials: Option<String>,
    #[serde(default)]
    pub development: bool,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl NotificationRequest {
    pub fn new(platform: Platform, tokens: Vec<String>) -> Self {
        Self {
            platform,
            tokens,
            to: None,
            condition: None,
            app_id: DEFAULT_APP_ID,
            retry: 0,
            api_key: None,
            credentials: None,
            development: false,
            payload: MessagePayload::default(),
        }
    }

    /// Per-request credential override. A non-empty bundle wins over an API key.
    pub fn credential_override(&self) -> Option<Credential> {
        select_credential(self.api_key.as_deref(), self.credentials.as_deref())
    }
}

/// Pick the credential to build a client with; a non-empty bundle takes precedence.
pub fn select_credential(api_key: Option<&str>, credentials: Option<&str>) -> Option<Credential> {
    match (api_key, credentials) {
        (_, Some(bundle)) if !bundle.is_empty() => Some(Credential::Bundle(bundle.to_string())),
        (Some(key), _) if !key.is_empty() => Some(Credential::ApiKey(key.to_string())),
        _ => None,
    }
}

/// The message handed to a platform client for one send attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub development: bool,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

/// Result for one device token, index-aligned with `PushMessage::tokens`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResult {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TokenResult {
    pub fn ok(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self {
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Shape of a platform client's reply to a successful send call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendResponse {
    /// Per-token results for device-token deliveries.
    Tokens { results: Vec<TokenResult> },
    /// Topic or condition delivery; a missing message ID means failure.
    Topic {
        #[serde(default)]
        message_id: Option<i64>,
        #[serde(default)]
        error: Option<String>,
    },
    /// Device-group delivery with the registration IDs that failed.
    DeviceGroup {
        #[serde(default)]
        success: u32,
        #[serde(default)]
        failure: u32,
        #[serde(default)]
        failed_registration_ids: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_from_json() {
        let req: NotificationRequest = serde_json::from_value(serde_json::json!({
            "platform": "android",
            "tokens": ["a", "b"],
            "title": "hello"
        }))
        .unwrap();
        assert_eq!(req.platform, Platform::Android);
        assert_eq!(req.tokens, vec!["a", "b"]);
        assert_eq!(req.app_id, DEFAULT_APP_ID);
        assert_eq!(req.retry, 0);
        assert_eq!(req.payload.title.as_deref(), Some("hello"));
        assert!(req.credential_override().is_none());
    }

    #[test]
    fn test_credential_bundle_wins() {
        assert_eq!(
            select_credential(Some("key"), Some("bundle")),
            Some(Credential::Bundle("bundle".to_string()))
        );
        assert_eq!(
            select_credential(Some("key"), Some("")),
            Some(Credential::ApiKey("key".to_string()))
        );
        assert_eq!(select_credential(Some(""), None), None);
    }

    #[test]
    fn test_send_response_tagging() {
        let resp: SendResponse = serde_json::from_value(serde_json::json!({
            "kind": "device_group",
            "success": 1,
            "failure": 1,
            "failed_registration_ids": ["r2"]
        }))
        .unwrap();
        assert_eq!(
            resp,
            SendResponse::DeviceGroup {
                success: 1,
                failure: 1,
                failed_registration_ids: vec!["r2".to_string()],
            }
        );
    }

    #[test]
    fn test_log_entry_serializes_status() {
        let entry = LogEntry::failure(Platform::Ios, 3, "tok", "boom");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["status"], "failed-push");
        assert_eq!(json["platform"], "ios");
        assert_eq!(json["error"], "boom");
        assert!(entry.is_failure());
    }
}
