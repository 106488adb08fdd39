//! Table-record database abstraction

use crate::db::query::DbQuery;
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{de::DeserializeOwned, Serialize};

/// Record stored in a table, identified by a string id
pub trait DbEntity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Record id, unique within its table
    fn id(&self) -> &str;
}

/// Table-oriented database interface
#[async_trait]
pub trait CommonDb: Send + Sync {
    /// Check the backend is reachable
    async fn ping(&self) -> Result<()>;

    /// Load the records that exist among `ids`, in the order of `ids`
    async fn get_by_ids<T: DbEntity>(&self, table: &str, ids: &[String]) -> Result<Vec<T>>;

    /// Save records, overwriting existing ones with the same id
    async fn save_batch<T: DbEntity>(&self, table: &str, rows: &[T]) -> Result<()>;

    /// Delete records by id, returning the ids that existed
    async fn delete_by_ids(&self, table: &str, ids: &[String]) -> Result<Vec<String>>;

    /// Stream records matching the query filters
    ///
    /// Streams are unordered and unlimited; use [`run_query`](Self::run_query)
    /// for ordering and paging.
    fn stream_query<T: DbEntity>(&self, q: &DbQuery) -> BoxStream<'static, Result<T>>;

    /// Run a query to completion
    async fn run_query<T: DbEntity>(&self, q: &DbQuery) -> Result<Vec<T>>;

    /// Number of records a query returns
    async fn run_query_count<T: DbEntity>(&self, q: &DbQuery) -> Result<usize>;

    /// Delete the records a query returns, returning their ids
    async fn delete_by_query<T: DbEntity>(&self, q: &DbQuery) -> Result<Vec<String>>;
}
