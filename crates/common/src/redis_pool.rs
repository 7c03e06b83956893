use std::time::Duration;

use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};

/// Open a Redis client without connecting. Fails only on a malformed URL.
pub fn open_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// Create a Redis connection manager for async operations.
///
/// Connection attempts are bounded so callers on the request path see an error
/// quickly while the server is down.
pub async fn create_redis_pool(client: Client) -> redis::RedisResult<ConnectionManager> {
    let config = ConnectionManagerConfig::new()
        .set_number_of_retries(1)
        .set_connection_timeout(Duration::from_secs(2))
        .set_response_timeout(Duration::from_secs(2));
    let manager = ConnectionManager::new_with_config(client, config).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
