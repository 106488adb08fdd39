//! Key-value database abstraction
//!
//! Plain get/save/delete/scan/increment semantics over named tables, with
//! opaque byte values.

use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// `(id, value)` pair stored in a key-value table
pub type KeyValueTuple = (String, Vec<u8>);

/// `(id, amount)` pair for increments; in results, the amount is the new value
pub type IncrementTuple = (String, i64);

/// Options for [`CommonKeyValueDb::save_batch`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveBatchOptions {
    /// Unix timestamp (seconds) at which the saved entries expire
    pub expire_at: Option<i64>,
}

impl SaveBatchOptions {
    /// Entries expire at the given unix timestamp (seconds)
    pub fn expire_at(expire_at: i64) -> Self {
        Self {
            expire_at: Some(expire_at),
        }
    }
}

/// Options for [`CommonKeyValueDb::create_table`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateTableOptions {
    /// Remove every existing entry of the table
    pub drop_if_exists: bool,
}

/// Optional capabilities of a key-value backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyValueDbSupport {
    /// `count` is implemented
    pub count: bool,
    /// `increment_batch` is implemented
    pub increment: bool,
}

impl KeyValueDbSupport {
    /// Every optional capability
    pub fn full() -> Self {
        Self {
            count: true,
            increment: true,
        }
    }
}

/// Key-value database interface
///
/// Streams yield entries in backend order and stop after `limit` items when a
/// non-zero limit is given.
#[async_trait]
pub trait CommonKeyValueDb: Send + Sync {
    /// Optional capabilities of this backend
    fn support(&self) -> KeyValueDbSupport;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;

    /// Load the entries that exist among `ids`, in the order of `ids`
    async fn get_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<KeyValueTuple>>;

    /// Delete entries by id; missing ids are ignored
    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> Result<()>;

    /// Save entries, overwriting existing values
    async fn save_batch(&self, table: &str, entries: Vec<KeyValueTuple>, opts: SaveBatchOptions) -> Result<()>;

    /// Stream every id of a table
    fn stream_ids(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<String>>;

    /// Stream every value of a table
    fn stream_values(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<Vec<u8>>>;

    /// Stream every entry of a table
    fn stream_entries(&self, table: &str, limit: Option<usize>) -> BoxStream<'static, Result<KeyValueTuple>>;

    /// Number of entries in a table
    async fn count(&self, table: &str) -> Result<usize>;

    /// Increment counters, returning the new values
    async fn increment_batch(&self, table: &str, increments: Vec<IncrementTuple>) -> Result<Vec<IncrementTuple>>;

    /// Prepare a table; only `drop_if_exists` has an effect on schemaless backends
    async fn create_table(&self, table: &str, opts: CreateTableOptions) -> Result<()>;

    /// Release the backend connection
    async fn close(&self) -> Result<()>;
}
