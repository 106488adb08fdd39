//! Storage layer
//!
//! Provides the Redis client wrapper, key naming and SCAN helpers.

pub mod keys;
pub mod redis;
pub mod scan;

pub use keys::Keys;
pub use redis::{RedisClient, RedisConfig, RedisPipeline};
pub use scan::ScanOptions;
