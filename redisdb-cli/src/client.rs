//! Redis client factory for CLI commands
//!
//! Provides centralized client creation and backend selection.

use color_eyre::Result;
use redisdb::db::CommonKeyValueDb;
use redisdb::storage::RedisClient;
use redisdb::{RedisHashKeyValueDb, RedisKeyValueDb};

/// Create a Redis client from a Redis URL
///
/// # Arguments
/// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
pub async fn create_client(redis_url: &str) -> Result<RedisClient> {
    RedisClient::from_url(redis_url)
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e))
}

/// Key-value backend for a table layout
///
/// `hash` selects one Redis hash per table instead of one key per entry.
pub fn key_value_db(client: RedisClient, hash: bool) -> Box<dyn CommonKeyValueDb> {
    if hash {
        Box::new(RedisHashKeyValueDb::new(client))
    } else {
        Box::new(RedisKeyValueDb::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis server"]
    async fn test_create_client() {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_client(&redis_url).await.unwrap();
        let db = key_value_db(client, true);
        db.ping().await.unwrap();
    }
}
