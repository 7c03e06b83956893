//! HTTP delivery gateway client.
//!
//! Each `PushMessage` is posted as JSON to the platform's configured gateway,
//! which answers with a `SendResponse`. Authentication follows the credential
//! kind: an API key is sent as `Authorization: key=<key>`, a credential bundle
//! as `X-Push-Credentials`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};

use pushgate_common::config::PlatformConfig;
use pushgate_common::error::PushError;
use pushgate_common::traits::{ClientFactory, PushClient};
use pushgate_common::types::{Credential, Platform, PushMessage, SendResponse};

use crate::error::NotifierError;

const CREDENTIALS_HEADER: &str = "x-push-credentials";

pub struct GatewayClient {
    http: Client,
    url: String,
    platform: Platform,
    auth: (HeaderName, HeaderValue),
}

impl GatewayClient {
    pub fn new(
        http: Client,
        platform: Platform,
        credential: &Credential,
        config: &PlatformConfig,
    ) -> Result<Self, PushError> {
        let url = config
            .gateway_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| PushError::Config(format!("missing {} gateway URL", platform)))?;

        Ok(Self {
            http,
            url,
            platform,
            auth: auth_header(credential)?,
        })
    }
}

fn auth_header(credential: &Credential) -> Result<(HeaderName, HeaderValue), PushError> {
    let (name, raw) = match credential {
        Credential::ApiKey(key) => (AUTHORIZATION, format!("key={}", key)),
        Credential::Bundle(bundle) => {
            (HeaderName::from_static(CREDENTIALS_HEADER), bundle.clone())
        }
    };
    let value = HeaderValue::from_str(&raw)
        .map_err(|_| PushError::Config("credential is not a valid header value".to_string()))?;
    Ok((name, value))
}

#[async_trait]
impl PushClient for GatewayClient {
    async fn send(&self, message: &PushMessage) -> Result<SendResponse, PushError> {
        let (name, value) = &self.auth;
        let response = self
            .http
            .post(&self.url)
            .header(name.clone(), value.clone())
            .json(message)
            .send()
            .await
            .map_err(|e| {
                PushError::Transport(format!("{} gateway request failed: {}", self.platform, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(platform = %self.platform, status = %status, "Gateway rejected send");
            return Err(PushError::Transport(format!(
                "{} gateway returned {}: {}",
                self.platform, status, body
            )));
        }

        response
            .json::<SendResponse>()
            .await
            .map_err(|e| {
                PushError::Transport(format!("invalid {} gateway response: {}", self.platform, e))
            })
    }
}

/// Builds `GatewayClient`s that share one connection pool.
#[derive(Clone)]
pub struct GatewayClientFactory {
    http: Client,
}

impl GatewayClientFactory {
    pub fn new(timeout: Duration) -> Result<Self, NotifierError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

impl ClientFactory for GatewayClientFactory {
    fn build(
        &self,
        platform: Platform,
        credential: &Credential,
        config: &PlatformConfig,
    ) -> Result<Arc<dyn PushClient>, PushError> {
        let client = GatewayClient::new(self.http.clone(), platform, credential, config)?;
        Ok(Arc::new(client))
    }
}
