//! Redis client wrapper
//!
//! Provides type-safe Redis operation interfaces on top of a fred connection pool.

mod pipeline;

pub use pipeline::RedisPipeline;

use crate::storage::scan::{parse_hscan_reply, parse_scan_reply, value_into_bytes, ScanOptions, SCAN_START};
use crate::{Error, Result};
use fred::{
    clients::RedisPool,
    cmd,
    interfaces::*,
    types::{Expiration, RedisConfig as FredRedisConfig, ReconnectPolicy, RedisKey, RedisValue},
};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Redis connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Connection pool size
    pub pool_size: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 10,
        }
    }
}

impl RedisConfig {
    /// Build a configuration from `REDIS_URL` and `REDIS_POOL_SIZE`
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup("REDIS_URL") {
            config.url = url;
        }
        if let Some(size) = lookup("REDIS_POOL_SIZE") {
            config.pool_size = size
                .parse()
                .map_err(|e| Error::Config(format!("Invalid REDIS_POOL_SIZE '{}': {}", size, e)))?;
            if config.pool_size == 0 {
                return Err(Error::Config("REDIS_POOL_SIZE must be at least 1".to_string()));
            }
        }
        Ok(config)
    }

    /// Set the connection URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the pool size
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }
}

/// Redis client
#[derive(Clone)]
pub struct RedisClient {
    pool: Arc<RedisPool>,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl RedisClient {
    /// Create a new Redis client and connect the pool
    pub async fn new(config: RedisConfig) -> Result<Self> {
        if config.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".to_string()));
        }

        let redis_config = FredRedisConfig::from_url(&config.url)?;
        let pool = RedisPool::new(
            redis_config,
            None,
            None,
            Some(ReconnectPolicy::default()),
            config.pool_size,
        )?;

        pool.init()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        watch_events(&pool);
        tracing::info!("redis: connected to {} (pool size {})", config.url, config.pool_size);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Create client from connection URL
    pub async fn from_url(url: impl Into<String>) -> Result<Self> {
        Self::new(RedisConfig::default().with_url(url)).await
    }

    /// Get the underlying Redis connection pool
    pub fn pool(&self) -> &Arc<RedisPool> {
        &self.pool
    }

    /// Whether every pooled connection is up
    pub fn is_connected(&self) -> bool {
        self.pool.clients().iter().all(|c| c.is_connected())
    }

    /// Reconnect after [`disconnect`](Self::disconnect); no-op when connected
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        self.pool
            .init()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        // QUIT closes the event streams, so listeners are registered again
        watch_events(&self.pool);
        tracing::info!("redis: reconnected");
        Ok(())
    }

    /// Close every pooled connection with QUIT
    pub async fn disconnect(&self) -> Result<()> {
        tracing::info!("redis: quit...");
        for client in self.pool.clients() {
            client.quit().await?;
        }
        tracing::info!("redis: quit");
        Ok(())
    }

    /// Ping Redis
    pub async fn ping(&self) -> Result<String> {
        let result: String = self.pool.ping().await?;
        Ok(result)
    }

    /// Delete keys, returns the number of keys removed
    pub async fn del(&self, keys: Vec<String>) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<RedisKey> = keys.into_iter().map(RedisKey::from).collect();
        let result: usize = self.pool.del(keys).await?;
        Ok(result)
    }

    /// Get a string value
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let result: Option<String> = self.pool.get(key).await?;
        Ok(result)
    }

    /// Get a value as raw bytes
    pub async fn get_buffer(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result: RedisValue = self.pool.get(key).await?;
        Ok(value_into_bytes(result))
    }

    /// Get many string values, in the order of `keys`
    pub async fn mget(&self, keys: Vec<String>) -> Result<Vec<Option<String>>> {
        let values = self.mget_values(keys).await?;
        Ok(values.into_iter().map(|v| v.as_string()).collect())
    }

    /// Get many values as raw bytes, in the order of `keys`
    pub async fn mget_buffer(&self, keys: Vec<String>) -> Result<Vec<Option<Vec<u8>>>> {
        let values = self.mget_values(keys).await?;
        Ok(values.into_iter().map(value_into_bytes).collect())
    }

    async fn mget_values(&self, keys: Vec<String>) -> Result<Vec<RedisValue>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let expected = keys.len();
        let keys: Vec<RedisKey> = keys.into_iter().map(RedisKey::from).collect();
        let result: RedisValue = self.pool.mget(keys).await?;
        check_reply_len("MGET", expected, result.into_array())
    }

    /// Set Key-Value
    pub async fn set(&self, key: &str, value: impl Into<RedisValue>) -> Result<()> {
        let _: () = self.pool.set(key, value.into(), None, None, false).await?;
        Ok(())
    }

    /// Set Key-Value expiring at a unix timestamp (seconds), via SET EXAT
    pub async fn set_with_ttl(&self, key: &str, value: impl Into<RedisValue>, expire_at: i64) -> Result<()> {
        let _: () = self
            .pool
            .set(key, value.into(), Some(Expiration::EXAT(expire_at)), None, false)
            .await?;
        Ok(())
    }

    /// Set many string values at once
    pub async fn mset(&self, entries: Vec<(String, String)>) -> Result<()> {
        let values: Vec<(RedisKey, RedisValue)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.mset_values(values).await
    }

    /// Set many byte values at once
    pub async fn mset_buffer(&self, entries: Vec<(String, Vec<u8>)>) -> Result<()> {
        let values: Vec<(RedisKey, RedisValue)> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), RedisValue::Bytes(v.into())))
            .collect();
        self.mset_values(values).await
    }

    async fn mset_values(&self, values: Vec<(RedisKey, RedisValue)>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        let _: () = self.pool.mset(values).await?;
        Ok(())
    }

    /// Increment a counter, returns the new value
    pub async fn incr(&self, key: &str, by: i64) -> Result<i64> {
        let result: i64 = self.pool.incr_by(key, by).await?;
        Ok(result)
    }

    /// Increment many counters in one round trip
    ///
    /// Returns `(key, new_value)` pairs in input order.
    pub async fn incr_batch(&self, increments: Vec<(String, i64)>) -> Result<Vec<(String, i64)>> {
        if increments.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipeline = self.pipeline();
        for (key, by) in &increments {
            pipeline = pipeline.incr_by(key.clone(), *by);
        }
        let replies = pipeline.execute().await?;
        zip_counters(increments, replies)
    }

    /// Remaining time to live of a key in seconds (-1 no expiry, -2 missing)
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        let result: i64 = self.pool.ttl(key).await?;
        Ok(result)
    }

    /// Hash operation: get all fields, `None` when the hash is missing or empty
    pub async fn hgetall(&self, key: &str) -> Result<Option<HashMap<String, String>>> {
        let result: HashMap<String, String> = self.pool.hgetall(key).await?;
        Ok((!result.is_empty()).then_some(result))
    }

    /// Hash operation: get field
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let result: Option<String> = self.pool.hget(key, field).await?;
        Ok(result)
    }

    /// Hash operation: set fields
    pub async fn hset<V>(&self, key: &str, fields: Vec<(String, V)>) -> Result<()>
    where
        V: Into<RedisValue>,
    {
        if fields.is_empty() {
            return Ok(());
        }
        let values: Vec<(RedisKey, RedisValue)> = fields
            .into_iter()
            .map(|(f, v)| (f.into(), v.into()))
            .collect();
        let _: () = self.pool.hset(key, values).await?;
        Ok(())
    }

    /// Hash operation: set fields that expire at a unix timestamp (seconds)
    ///
    /// Uses HEXPIREAT, which needs Redis 7.4 or newer.
    pub async fn hset_with_ttl<V>(&self, key: &str, fields: Vec<(String, V)>, expire_at: i64) -> Result<()>
    where
        V: Into<RedisValue>,
    {
        if fields.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = fields.iter().map(|(f, _)| f.clone()).collect();
        self.hset(key, fields).await?;

        let mut args: Vec<RedisValue> = Vec::with_capacity(names.len() + 4);
        args.push(key.into());
        args.push(RedisValue::Integer(expire_at));
        args.push("FIELDS".into());
        args.push(RedisValue::Integer(names.len() as i64));
        args.extend(names.into_iter().map(RedisValue::from));

        let _: RedisValue = self.pool.next().custom(cmd!("HEXPIREAT"), args).await?;
        Ok(())
    }

    /// Hash operation: delete fields
    pub async fn hdel(&self, key: &str, fields: Vec<String>) -> Result<usize> {
        if fields.is_empty() {
            return Ok(0);
        }
        let fields: Vec<RedisKey> = fields.into_iter().map(RedisKey::from).collect();
        let result: usize = self.pool.hdel(key, fields).await?;
        Ok(result)
    }

    /// Hash operation: get many fields as strings, in the order of `fields`
    pub async fn hmget(&self, key: &str, fields: Vec<String>) -> Result<Vec<Option<String>>> {
        let values = self.hmget_values(key, fields).await?;
        Ok(values.into_iter().map(|v| v.as_string()).collect())
    }

    /// Hash operation: get many fields as raw bytes, in the order of `fields`
    pub async fn hmget_buffer(&self, key: &str, fields: Vec<String>) -> Result<Vec<Option<Vec<u8>>>> {
        let values = self.hmget_values(key, fields).await?;
        Ok(values.into_iter().map(value_into_bytes).collect())
    }

    async fn hmget_values(&self, key: &str, fields: Vec<String>) -> Result<Vec<RedisValue>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let expected = fields.len();
        let fields: Vec<RedisKey> = fields.into_iter().map(RedisKey::from).collect();
        let result: RedisValue = self.pool.hmget(key, fields).await?;
        check_reply_len("HMGET", expected, result.into_array())
    }

    /// Hash operation: increment a field, returns the new value
    pub async fn hincr(&self, key: &str, field: &str, by: i64) -> Result<i64> {
        let result: i64 = self.pool.hincrby(key, field, by).await?;
        Ok(result)
    }

    /// Hash operation: increment many fields in one round trip
    ///
    /// Returns `(field, new_value)` pairs in input order.
    pub async fn hincr_batch(&self, key: &str, increments: Vec<(String, i64)>) -> Result<Vec<(String, i64)>> {
        if increments.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipeline = self.pipeline();
        for (field, by) in &increments {
            pipeline = pipeline.hincr_by(key.to_string(), field.clone(), *by);
        }
        let replies = pipeline.execute().await?;
        zip_counters(increments, replies)
    }

    /// Stream of key batches matching `opts`, as returned by successive SCAN calls
    ///
    /// Empty batches are skipped. Keys may repeat across batches if they are
    /// modified during the iteration, as with SCAN itself.
    pub fn scan_stream(&self, opts: ScanOptions) -> BoxStream<'static, Result<Vec<String>>> {
        let client = self.clone();
        stream::try_unfold(Some(SCAN_START.to_string()), move |cursor| {
            let client = client.clone();
            let opts = opts.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok(None);
                };
                let (next, keys) = client.scan_page(&cursor, &opts).await?;
                let next = (next != SCAN_START).then_some(next);
                Ok(Some((keys, next)))
            }
        })
        .try_filter(|keys| futures::future::ready(!keys.is_empty()))
        .boxed()
    }

    /// Like [`scan_stream`](Self::scan_stream), flattened into single keys
    pub fn scan_stream_flat(&self, opts: ScanOptions) -> BoxStream<'static, Result<String>> {
        self.scan_stream(opts)
            .map_ok(|keys| stream::iter(keys.into_iter().map(Ok::<_, crate::Error>)))
            .try_flatten()
            .boxed()
    }

    /// Count keys matching `opts` by walking a full SCAN
    pub async fn scan_count(&self, opts: ScanOptions) -> Result<usize> {
        self.scan_stream(opts)
            .try_fold(0usize, |count, keys| async move { Ok(count + keys.len()) })
            .await
    }

    async fn scan_page(&self, cursor: &str, opts: &ScanOptions) -> Result<(String, Vec<String>)> {
        let mut args: Vec<RedisValue> = vec![cursor.into()];
        args.extend(opts.to_args());
        let reply: RedisValue = self.pool.next().custom(cmd!("SCAN"), args).await?;
        parse_scan_reply(reply)
    }

    /// Stream of `(field, value)` batches of a hash, as returned by successive HSCAN calls
    pub fn hscan_stream(&self, key: &str, opts: ScanOptions) -> BoxStream<'static, Result<Vec<(String, Vec<u8>)>>> {
        let client = self.clone();
        let key = key.to_string();
        stream::try_unfold(Some(SCAN_START.to_string()), move |cursor| {
            let client = client.clone();
            let key = key.clone();
            let opts = opts.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok(None);
                };
                let (next, entries) = client.hscan_page(&key, &cursor, &opts).await?;
                let next = (next != SCAN_START).then_some(next);
                Ok(Some((entries, next)))
            }
        })
        .try_filter(|entries| futures::future::ready(!entries.is_empty()))
        .boxed()
    }

    /// Count hash fields matching `opts` by walking a full HSCAN
    pub async fn hscan_count(&self, key: &str, opts: ScanOptions) -> Result<usize> {
        self.hscan_stream(key, opts)
            .try_fold(0usize, |count, entries| async move { Ok(count + entries.len()) })
            .await
    }

    async fn hscan_page(&self, key: &str, cursor: &str, opts: &ScanOptions) -> Result<(String, Vec<(String, Vec<u8>)>)> {
        let mut args: Vec<RedisValue> = vec![key.into(), cursor.into()];
        args.extend(opts.to_args());
        let reply: RedisValue = self.pool.next().custom(cmd!("HSCAN"), args).await?;
        parse_hscan_reply(reply)
    }

    /// Delete every key of a table (`table:*`) in a single pipeline
    pub async fn drop_table(&self, table: &str) -> Result<usize> {
        let pattern = crate::storage::Keys::default().table_pattern(table);
        let count = self.delete_matching(ScanOptions::matching(pattern)).await?;
        tracing::info!("redis: dropped table {} ({} keys)", table, count);
        Ok(count)
    }

    /// Delete every key of the current database by scanning
    pub async fn clear_all(&self) -> Result<usize> {
        tracing::info!("redis: clearAll...");
        let count = self.delete_matching(ScanOptions::matching("*")).await?;
        tracing::info!("redis: clearAll removed {} keys", count);
        Ok(count)
    }

    async fn delete_matching(&self, opts: ScanOptions) -> Result<usize> {
        let batches: Vec<Vec<String>> = self.scan_stream(opts).try_collect().await?;

        let mut count = 0;
        let mut pipeline = self.pipeline();
        for keys in batches {
            count += keys.len();
            pipeline = pipeline.del(keys);
        }
        pipeline.execute().await?;
        Ok(count)
    }

    /// Remove every key of every database with FLUSHALL
    pub async fn flush_all(&self) -> Result<()> {
        let result: String = self.pool.next().flushall(false).await?;
        tracing::info!("redis: flushall: {}", result);
        Ok(())
    }

    /// Pipeline operation
    pub fn pipeline(&self) -> RedisPipeline {
        RedisPipeline::new(self.pool.clone())
    }
}

// Connection events of every pooled client go to the log
fn watch_events(pool: &RedisPool) {
    for client in pool.clients() {
        client.on_reconnect(|server| {
            tracing::info!("redis: reconnected to {}", server);
            Ok(())
        });
        client.on_unresponsive(|server| {
            tracing::warn!("redis: connection to {} is unresponsive", server);
            Ok(())
        });
        client.on_error(|error| {
            tracing::error!("redis: connection error: {}", error);
            Ok(())
        });
    }
}

fn check_reply_len(command: &str, expected: usize, values: Vec<RedisValue>) -> Result<Vec<RedisValue>> {
    if values.len() != expected {
        return Err(Error::Serialization(format!(
            "Expected {} {} replies, got {}",
            expected,
            command,
            values.len()
        )));
    }
    Ok(values)
}

fn zip_counters(increments: Vec<(String, i64)>, replies: Vec<RedisValue>) -> Result<Vec<(String, i64)>> {
    if replies.len() != increments.len() {
        return Err(Error::Serialization(format!(
            "Expected {} increment replies, got {}",
            increments.len(),
            replies.len()
        )));
    }

    increments
        .into_iter()
        .zip(replies)
        .map(|((name, _), reply)| {
            reply
                .as_i64()
                .map(|value| (name, value))
                .ok_or_else(|| Error::Serialization(format!("Non-integer increment reply: {:?}", reply)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.pool_size, 10);
    }

    #[test]
    fn test_redis_config_from_lookup() {
        let config = RedisConfig::from_lookup(|name| match name {
            "REDIS_URL" => Some("redis://cache:6380".to_string()),
            "REDIS_POOL_SIZE" => Some("4".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config, RedisConfig::default().with_url("redis://cache:6380").with_pool_size(4));

        let config = RedisConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, RedisConfig::default());
    }

    #[test]
    fn test_redis_config_invalid_pool_size() {
        let bad = |value: &'static str| {
            RedisConfig::from_lookup(move |name| (name == "REDIS_POOL_SIZE").then(|| value.to_string()))
        };
        assert!(matches!(bad("many"), Err(Error::Config(_))));
        assert!(matches!(bad("0"), Err(Error::Config(_))));
    }

    #[test]
    fn test_zip_counters() {
        let increments = vec![("a".to_string(), 1), ("b".to_string(), 2)];
        let replies = vec![RedisValue::Integer(3), RedisValue::Integer(-4)];
        assert_eq!(
            zip_counters(increments.clone(), replies).unwrap(),
            vec![("a".to_string(), 3), ("b".to_string(), -4)]
        );

        assert!(zip_counters(increments.clone(), vec![RedisValue::Integer(1)]).is_err());
        assert!(zip_counters(increments, vec![RedisValue::Null, RedisValue::Integer(1)]).is_err());
    }

    #[test]
    fn test_check_reply_len() {
        let values = vec![RedisValue::from("a"), RedisValue::Null];
        assert_eq!(check_reply_len("MGET", 2, values.clone()).unwrap(), values);

        let err = check_reply_len("HMGET", 3, values).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().contains("Expected 3 HMGET replies, got 2"));
    }

    #[tokio::test]
    #[ignore = "Requires Redis server"]
    async fn test_redis_ping() {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let client = RedisClient::from_url(&redis_url)
            .await
            .unwrap();
        let result = client.ping().await.unwrap();
        assert_eq!(result, "PONG");
    }
}
