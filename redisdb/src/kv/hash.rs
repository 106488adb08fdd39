//! Key-value table stored as a single Redis hash
//!
//! The table name is the hash key and every id is a field of that hash.

use super::with_limit;
use crate::db::kv::{
    CommonKeyValueDb, CreateTableOptions, IncrementTuple, KeyValueDbSupport, KeyValueTuple,
    SaveBatchOptions,
};
use crate::storage::{RedisClient, ScanOptions};
use crate::Result;
use async_trait::async_trait;
use fred::types::RedisValue;
use futures::stream::{self, BoxStream, TryStreamExt};

/// Key-value DB storing each table as one hash
///
/// Expiring entries need HEXPIREAT (Redis 7.4+); on older servers use
/// [`RedisKeyValueDb`](super::RedisKeyValueDb) when expiry matters.
#[derive(Debug, Clone)]
pub struct RedisHashKeyValueDb {
    client: RedisClient,
}

impl RedisHashKeyValueDb {
    /// Create a hash-backed key-value DB on top of a client
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Underlying Redis client
    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    fn entries(&self, table: &str) -> impl futures::Stream<Item = Result<KeyValueTuple>> + Send + 'static {
        self.client
            .hscan_stream(table, ScanOptions::all())
            .map_ok(|entries| stream::iter(entries.into_iter().map(Ok::<_, crate::Error>)))
            .try_flatten()
    }
}

#[async_trait]
impl CommonKeyValueDb for RedisHashKeyValueDb {
    fn support(&self) -> KeyValueDbSupport {
        KeyValueDbSupport::full()
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await?;
        Ok(())
    }

    async fn get_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<KeyValueTuple>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values = self.client.hmget_buffer(table, ids.to_vec()).await?;
        Ok(ids
            .iter()
            .zip(values)
            .filter_map(|(id, value)| value.map(|v| (id.clone(), v)))
            .collect())
    }

    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let deleted = self.client.hdel(table, ids.to_vec()).await?;
        tracing::debug!("Deleted {}/{} fields from hash {}", deleted, ids.len(), table);
        Ok(())
    }

    async fn save_batch(&self, table: &str, entries: Vec<KeyValueTuple>, opts: SaveBatchOptions) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let count = entries.len();
        let fields: Vec<(String, RedisValue)> = entries
            .into_iter()
            .map(|(id, value)| (id, RedisValue::Bytes(value.into())))
            .collect();

        match opts.expire_at {
            Some(expire_at) => self.client.hset_with_ttl(table, fields, expire_at).await?,
            None => self.client.hset(table, fields).await?,
        }

        tracing::debug!("Saved {} fields to hash {}", count, table);
        Ok(())
    }

    fn stream_ids(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<String>> {
        with_limit(self.entries(table).map_ok(|(id, _)| id), limit)
    }

    fn stream_values(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<Vec<u8>>> {
        with_limit(self.entries(table).map_ok(|(_, value)| value), limit)
    }

    fn stream_entries(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<KeyValueTuple>> {
        with_limit(self.entries(table), limit)
    }

    async fn count(&self, table: &str) -> Result<usize> {
        self.client.hscan_count(table, ScanOptions::all()).await
    }

    async fn increment_batch(&self, table: &str, increments: Vec<IncrementTuple>) -> Result<Vec<IncrementTuple>> {
        self.client.hincr_batch(table, increments).await
    }

    async fn create_table(&self, table: &str, opts: CreateTableOptions) -> Result<()> {
        if !opts.drop_if_exists {
            return Ok(());
        }
        self.client.del(vec![table.to_string()]).await?;
        tracing::info!("Dropped hash table {}", table);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.disconnect().await
    }
}
