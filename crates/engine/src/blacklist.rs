//! Advisory blacklist of device tokens known to be undeliverable.
//!
//! Entries are keyed by a fixed-width hash of the token (`bl:<hash>`) and hold
//! the raw token as value with a 24 hour expiry. Known development tokens live
//! under `dev:<hash>` without expiry and force sandbox delivery.
//!
//! Absence of a key means "not known blacklisted", never "known valid". A store
//! that cannot answer yields `FilterVerdict::Unknown`, which callers treat as
//! clear. Lookups never wait for the store to come back.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use pushgate_common::redis_pool::create_redis_pool;

use crate::error::FilterError;

/// Lifetime of a blacklist entry.
pub const BLACKLIST_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of screening a single token.
#[derive(Debug)]
pub enum FilterVerdict {
    Blacklisted,
    Clear,
    /// The store could not answer.
    Unknown(FilterError),
}

/// Store-backed token filter shared by all workers.
#[async_trait]
pub trait TokenFilter: Send + Sync {
    /// Record a token as permanently invalid. Idempotent.
    async fn mark(&self, token: &str) -> Result<(), FilterError>;

    /// Whether the token is currently blacklisted.
    async fn is_blacklisted(&self, token: &str) -> Result<bool, FilterError>;

    /// Record a token as a development (sandbox) token.
    async fn mark_development(&self, token: &str) -> Result<(), FilterError>;

    async fn is_development(&self, token: &str) -> Result<bool, FilterError>;

    async fn screen(&self, token: &str) -> FilterVerdict {
        match self.is_blacklisted(token).await {
            Ok(true) => FilterVerdict::Blacklisted,
            Ok(false) => FilterVerdict::Clear,
            Err(e) => FilterVerdict::Unknown(e),
        }
    }
}

fn token_hash(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..8])
}

pub fn blacklist_key(token: &str) -> String {
    format!("bl:{}", token_hash(token))
}

pub fn development_key(token: &str) -> String {
    format!("dev:{}", token_hash(token))
}

const RECONNECT_MIN: Duration = Duration::from_secs(1);
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// Upper bound on tokens held by the in-process filter, per namespace.
const MEMORY_CAPACITY: u64 = 1_000_000;

/// Redis-backed filter.
///
/// The connection is made once. While it is missing every lookup fails with
/// `FilterError::Disconnected` at once and a single background task keeps
/// dialing; after that the connection manager reconnects on its own.
pub struct RedisTokenFilter {
    conn: Arc<OnceCell<ConnectionManager>>,
}

impl RedisTokenFilter {
    pub async fn connect(client: redis::Client) -> Self {
        let conn = Arc::new(OnceCell::new());
        match create_redis_pool(client.clone()).await {
            Ok(manager) => {
                let _ = conn.set(manager);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Blacklist store unreachable, retrying in background");
                tokio::spawn(reconnect(client, Arc::downgrade(&conn)));
            }
        }
        Self { conn }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    fn connection(&self) -> Result<ConnectionManager, FilterError> {
        self.conn.get().cloned().ok_or(FilterError::Disconnected)
    }
}

/// Dial with exponential backoff until connected or the filter is dropped.
async fn reconnect(client: redis::Client, cell: Weak<OnceCell<ConnectionManager>>) {
    let mut delay = RECONNECT_MIN;
    loop {
        tokio::time::sleep(delay).await;
        let Some(cell) = cell.upgrade() else {
            return;
        };
        match create_redis_pool(client.clone()).await {
            Ok(manager) => {
                let _ = cell.set(manager);
                return;
            }
            Err(e) => {
                delay = (delay * 2).min(RECONNECT_MAX);
                tracing::warn!(
                    error = %e,
                    retry_in_secs = delay.as_secs(),
                    "Blacklist store still unreachable"
                );
            }
        }
    }
}

#[async_trait]
impl TokenFilter for RedisTokenFilter {
    async fn mark(&self, token: &str) -> Result<(), FilterError> {
        let mut conn = self.connection()?;
        conn.set_ex::<_, _, ()>(blacklist_key(token), token, BLACKLIST_TTL.as_secs())
            .await?;
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, FilterError> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.get(blacklist_key(token)).await?;
        Ok(value.is_some_and(|v| !v.is_empty()))
    }

    async fn mark_development(&self, token: &str) -> Result<(), FilterError> {
        let mut conn = self.connection()?;
        conn.set::<_, _, ()>(development_key(token), token).await?;
        Ok(())
    }

    async fn is_development(&self, token: &str) -> Result<bool, FilterError> {
        let mut conn = self.connection()?;
        let value: Option<String> = conn.get(development_key(token)).await?;
        Ok(value.is_some_and(|v| !v.is_empty()))
    }
}

/// In-process filter used when no blacklist store is configured.
pub struct MemoryTokenFilter {
    blacklist: Cache<String, String>,
    development: Cache<String, String>,
}

impl MemoryTokenFilter {
    pub fn new() -> Self {
        Self::with_ttl(BLACKLIST_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            blacklist: Cache::builder()
                .max_capacity(MEMORY_CAPACITY)
                .time_to_live(ttl)
                .build(),
            development: Cache::builder().max_capacity(MEMORY_CAPACITY).build(),
        }
    }
}

impl Default for MemoryTokenFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenFilter for MemoryTokenFilter {
    async fn mark(&self, token: &str) -> Result<(), FilterError> {
        self.blacklist
            .insert(blacklist_key(token), token.to_string())
            .await;
        Ok(())
    }

    async fn is_blacklisted(&self, token: &str) -> Result<bool, FilterError> {
        let value = self.blacklist.get(&blacklist_key(token)).await;
        Ok(value.is_some_and(|v| !v.is_empty()))
    }

    async fn mark_development(&self, token: &str) -> Result<(), FilterError> {
        self.development
            .insert(development_key(token), token.to_string())
            .await;
        Ok(())
    }

    async fn is_development(&self, token: &str) -> Result<bool, FilterError> {
        let value = self.development.get(&development_key(token)).await;
        Ok(value.is_some_and(|v| !v.is_empty()))
    }
}
