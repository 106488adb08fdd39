//! Table-record database backed by Redis strings
//!
//! Each record is stored as JSON under `table:id`. Redis cannot filter on
//! record content, so queries are only answered when `run_queries` is set: the
//! whole table is scanned and filtered in memory.

use crate::db::common::{CommonDb, DbEntity};
use crate::db::query::{filter_in_memory, query_in_memory, DbQuery};
use crate::storage::{Keys, RedisClient, RedisConfig, ScanOptions};
use crate::Result;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

/// RedisDb options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisDbOptions {
    /// Connection settings
    pub redis: RedisConfig,

    /// Answer queries by scanning the whole table into memory (default: false)
    ///
    /// When disabled, `stream_query` yields nothing and `run_query` returns
    /// an empty result.
    pub run_queries: bool,

    /// Separator between table and id in keys (default: `:`)
    pub key_separator: String,
}

impl Default for RedisDbOptions {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            run_queries: false,
            key_separator: crate::storage::keys::DEFAULT_SEPARATOR.to_string(),
        }
    }
}

impl RedisDbOptions {
    /// Set connection settings
    #[must_use]
    pub fn with_redis(mut self, redis: RedisConfig) -> Self {
        self.redis = redis;
        self
    }

    /// Enable or disable in-memory queries
    #[must_use]
    pub fn with_run_queries(mut self, run_queries: bool) -> Self {
        self.run_queries = run_queries;
        self
    }

    /// Set the key separator
    #[must_use]
    pub fn with_key_separator(mut self, separator: impl Into<String>) -> Self {
        self.key_separator = separator.into();
        self
    }
}

/// Table-record DB on Redis
#[derive(Debug, Clone)]
pub struct RedisDb {
    client: RedisClient,
    keys: Keys,
    run_queries: bool,
}

impl RedisDb {
    /// Connect to Redis and create the DB
    pub async fn connect(options: RedisDbOptions) -> Result<Self> {
        let client = RedisClient::new(options.redis.clone()).await?;
        Ok(Self::with_client(client, &options))
    }

    /// Create the DB on an existing client; `options.redis` is ignored
    pub fn with_client(client: RedisClient, options: &RedisDbOptions) -> Self {
        Self {
            client,
            keys: Keys::new(options.key_separator.clone()),
            run_queries: options.run_queries,
        }
    }

    /// Underlying Redis client
    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    /// Record key of an id
    pub fn key(&self, table: &str, id: &str) -> String {
        self.keys.id_to_key(table, id)
    }

    /// Remove every key in Redis (FLUSHALL)
    pub async fn reset_cache(&self) -> Result<()> {
        self.client.flush_all().await
    }

    /// Close the connection
    pub async fn quit(&self) -> Result<()> {
        tracing::info!("RedisDb disconnecting...");
        self.client.disconnect().await
    }
}

fn serialize<T: DbEntity>(row: &T) -> Result<String> {
    Ok(serde_json::to_string(row)?)
}

// Unreadable records are skipped rather than failing the whole batch
fn deserialize<T: DbEntity>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(row) => Some(row),
        Err(e) => {
            tracing::error!("Failed to deserialize record {}: {}", key, e);
            None
        }
    }
}

async fn load<T: DbEntity>(client: &RedisClient, keys: Vec<String>) -> Result<Vec<T>> {
    let values = client.mget(keys.clone()).await?;
    Ok(keys
        .iter()
        .zip(values)
        .filter_map(|(key, raw)| raw.and_then(|raw| deserialize(key, &raw)))
        .collect())
}

#[async_trait]
impl CommonDb for RedisDb {
    async fn ping(&self) -> Result<()> {
        self.client.ping().await?;
        Ok(())
    }

    async fn get_by_ids<T: DbEntity>(&self, table: &str, ids: &[String]) -> Result<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        load(&self.client, self.keys.ids_to_keys(table, ids)).await
    }

    async fn save_batch<T: DbEntity>(&self, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let entries = rows
            .iter()
            .map(|row| Ok((self.keys.id_to_key(table, row.id()), serialize(row)?)))
            .collect::<Result<Vec<_>>>()?;
        self.client.mset(entries).await?;
        tracing::debug!("Saved {} records to {}", rows.len(), table);
        Ok(())
    }

    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipeline = self.client.pipeline();
        for key in self.keys.ids_to_keys(table, ids) {
            pipeline = pipeline.del(vec![key]);
        }
        let replies = pipeline.execute().await?;

        let deleted: Vec<String> = ids
            .iter()
            .zip(replies)
            .filter(|(_, reply)| reply.as_i64() == Some(1))
            .map(|(id, _)| id.clone())
            .collect();
        tracing::debug!("Deleted {}/{} records from {}", deleted.len(), ids.len(), table);
        Ok(deleted)
    }

    fn stream_query<T: DbEntity>(&self, q: &DbQuery) -> BoxStream<'static, Result<T>> {
        if !self.run_queries {
            return stream::empty().boxed();
        }

        let client = self.client.clone();
        let q = q.clone();
        self.client
            .scan_stream(ScanOptions::matching(self.keys.table_pattern(&q.table)))
            .and_then(move |keys| {
                let client = client.clone();
                let q = q.clone();
                async move {
                    let rows = load::<T>(&client, keys).await?;
                    filter_in_memory(&q, rows)
                }
            })
            .map_ok(|rows| stream::iter(rows.into_iter().map(Ok::<_, crate::Error>)))
            .try_flatten()
            .boxed()
    }

    async fn run_query<T: DbEntity>(&self, q: &DbQuery) -> Result<Vec<T>> {
        let rows: Vec<T> = self.stream_query::<T>(q).try_collect().await?;
        query_in_memory(q, rows)
    }

    async fn run_query_count<T: DbEntity>(&self, q: &DbQuery) -> Result<usize> {
        Ok(self.run_query::<T>(q).await?.len())
    }

    async fn delete_by_query<T: DbEntity>(&self, q: &DbQuery) -> Result<Vec<String>> {
        let ids: Vec<String> = self
            .run_query::<T>(q)
            .await?
            .iter()
            .map(|row| row.id().to_string())
            .collect();
        self.delete_by_ids(&q.table, &ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: String,
        n: i64,
    }

    impl DbEntity for Item {
        fn id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn test_options_default() {
        let options = RedisDbOptions::default();
        assert!(!options.run_queries);
        assert_eq!(options.key_separator, ":");
        assert_eq!(options.redis, RedisConfig::default());

        let options = options.with_run_queries(true).with_key_separator("_");
        assert!(options.run_queries);
        assert_eq!(options.key_separator, "_");
    }

    #[test]
    fn test_serialize_roundtrip_and_bad_records() {
        let item = Item { id: "a".into(), n: 3 };
        let raw = serialize(&item).unwrap();
        assert_eq!(raw, r#"{"id":"a","n":3}"#);
        assert_eq!(deserialize::<Item>("t:a", &raw), Some(item));
        assert_eq!(deserialize::<Item>("t:b", "not json"), None);
        assert_eq!(deserialize::<Item>("t:c", r#"{"id":"c"}"#), None);
    }
}
