//! # redisdb
//!
//! Redis backends for generic database abstractions, so code written against
//! [`CommonDb`](db::CommonDb) or [`CommonKeyValueDb`](db::CommonKeyValueDb) can
//! use Redis as its store.
//!
//! ## Backends
//!
//! - [`RedisKeyValueDb`](kv::RedisKeyValueDb): key-value tables, one string key per entry
//! - [`RedisHashKeyValueDb`](kv::RedisHashKeyValueDb): key-value tables, one hash per table
//! - [`RedisDb`](redis_db::RedisDb): JSON records with optional in-memory queries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use redisdb::db::{CommonKeyValueDb, SaveBatchOptions};
//! use redisdb::kv::RedisKeyValueDb;
//! use redisdb::storage::RedisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RedisClient::from_url("redis://localhost:6379").await?;
//!     let db = RedisKeyValueDb::new(client);
//!
//!     db.save_batch(
//!         "sessions",
//!         vec![("s1".to_string(), b"payload".to_vec())],
//!         SaveBatchOptions::default(),
//!     )
//!     .await?;
//!
//!     let entries = db.get_by_ids("sessions", &["s1".to_string()]).await?;
//!     assert_eq!(entries.len(), 1);
//!
//!     db.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;

// Generic DB traits and queries
pub mod db;

// Redis backends
pub mod kv;
pub mod redis_db;

// Storage layer
pub mod storage;

// Re-export common types
pub use error::{Error, Result};
pub use kv::{RedisHashKeyValueDb, RedisKeyValueDb};
pub use redis_db::{RedisDb, RedisDbOptions};
