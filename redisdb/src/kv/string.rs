//! Key-value table stored as one Redis string per entry

use super::with_limit;
use crate::config;
use crate::db::kv::{
    CommonKeyValueDb, CreateTableOptions, IncrementTuple, KeyValueDbSupport, KeyValueTuple,
    SaveBatchOptions,
};
use crate::storage::{Keys, RedisClient, ScanOptions};
use crate::Result;
use async_trait::async_trait;
use fred::types::RedisValue;
use futures::stream::{self, BoxStream, TryStreamExt};

/// Key-value DB storing each entry under its own `table:id` key
#[derive(Debug, Clone)]
pub struct RedisKeyValueDb {
    client: RedisClient,
    keys: Keys,
}

impl RedisKeyValueDb {
    /// Create a key-value DB on top of a client
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            keys: Keys::default(),
        }
    }

    /// Underlying Redis client
    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    fn table_scan(&self, table: &str) -> ScanOptions {
        ScanOptions::matching(self.keys.table_pattern(table))
    }
}

#[async_trait]
impl CommonKeyValueDb for RedisKeyValueDb {
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
        // MGET replies in the order of the requested keys
        let values = self.client.mget_buffer(self.keys.ids_to_keys(table, ids)).await?;
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
        let deleted = self.client.del(self.keys.ids_to_keys(table, ids)).await?;
        tracing::debug!("Deleted {}/{} entries from {}", deleted, ids.len(), table);
        Ok(())
    }

    async fn save_batch(&self, table: &str, entries: Vec<KeyValueTuple>, opts: SaveBatchOptions) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let count = entries.len();

        match opts.expire_at {
            // MSET has no expiry option, so each entry gets its own SET ... EXAT
            Some(expire_at) => {
                let mut pipeline = self.client.pipeline();
                for (id, value) in entries {
                    pipeline = pipeline.set_with_ttl(
                        self.keys.id_to_key(table, &id),
                        RedisValue::Bytes(value.into()),
                        expire_at,
                    );
                }
                pipeline.execute().await?;
            }
            None => {
                let entries = entries
                    .into_iter()
                    .map(|(id, value)| (self.keys.id_to_key(table, &id), value))
                    .collect();
                self.client.mset_buffer(entries).await?;
            }
        }

        tracing::debug!("Saved {} entries to {}", count, table);
        Ok(())
    }

    fn stream_ids(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<String>> {
        let keys = self.keys.clone();
        let table = table.to_string();
        let ids = self
            .client
            .scan_stream(self.table_scan(&table))
            .map_ok(move |batch| stream::iter(keys.keys_to_ids(&table, &batch).into_iter().map(Ok::<_, crate::Error>)))
            .try_flatten();
        with_limit(ids, limit)
    }

    fn stream_values(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<Vec<u8>>> {
        let client = self.client.clone();
        let values = self
            .client
            .scan_stream(self.table_scan(table))
            .map_ok(move |batch| {
                let client = client.clone();
                async move { client.mget_buffer(batch).await }
            })
            .try_buffered(config::get_stream_concurrency())
            // keys removed between SCAN and MGET come back as nil
            .map_ok(|values| stream::iter(values.into_iter().flatten().map(Ok::<_, crate::Error>)))
            .try_flatten();
        with_limit(values, limit)
    }

    fn stream_entries(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<KeyValueTuple>> {
        let client = self.client.clone();
        let keys = self.keys.clone();
        let table = table.to_string();
        let entries = self
            .client
            .scan_stream(self.table_scan(&table))
            .map_ok(move |batch| {
                let client = client.clone();
                let ids = keys.keys_to_ids(&table, &batch);
                async move {
                    let values = client.mget_buffer(batch).await?;
                    Ok::<_, crate::Error>(
                        ids.into_iter()
                            .zip(values)
                            .filter_map(|(id, value)| value.map(|v| Ok::<_, crate::Error>((id, v))))
                            .collect::<Vec<_>>(),
                    )
                }
            })
            .try_buffered(config::get_stream_concurrency())
            .map_ok(stream::iter)
            .try_flatten();
        with_limit(entries, limit)
    }

    async fn count(&self, table: &str) -> Result<usize> {
        self.client.scan_count(self.table_scan(table)).await
    }

    async fn increment_batch(&self, table: &str, increments: Vec<IncrementTuple>) -> Result<Vec<IncrementTuple>> {
        let increments = increments
            .into_iter()
            .map(|(id, by)| (self.keys.id_to_key(table, &id), by))
            .collect();
        let results = self.client.incr_batch(increments).await?;
        Ok(results
            .into_iter()
            .map(|(key, value)| (self.keys.key_to_id(table, &key), value))
            .collect())
    }

    async fn create_table(&self, table: &str, opts: CreateTableOptions) -> Result<()> {
        if !opts.drop_if_exists {
            return Ok(());
        }
        self.client.drop_table(table).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.disconnect().await
    }
}
