//! Database abstractions
//!
//! Backend-independent traits implemented by the Redis adapters in
//! [`crate::kv`] and [`crate::redis_db`].

pub mod common;
pub mod kv;
pub mod query;

pub use common::{CommonDb, DbEntity};
pub use kv::{
    CommonKeyValueDb, CreateTableOptions, IncrementTuple, KeyValueDbSupport, KeyValueTuple,
    SaveBatchOptions,
};
pub use query::{query_in_memory, DbQuery, Filter, FilterOp, Order};
