//! Key-value backends
//!
//! Two layouts of a key-value table in Redis:
//!
//! - [`RedisKeyValueDb`]: one string key per entry (`table:id`). Supports
//!   per-entry expiry on every Redis version.
//! - [`RedisHashKeyValueDb`]: one hash per table, ids are hash fields. Entry
//!   expiry needs Redis 7.4+ (HEXPIREAT).

mod hash;
mod string;

pub use hash::RedisHashKeyValueDb;
pub use string::RedisKeyValueDb;

use crate::Result;
use futures::stream::{BoxStream, Stream, StreamExt};

/// Box a stream, stopping after `limit` items when given
///
/// A limit of zero means no limit.
pub(crate) fn with_limit<S, T>(stream: S, limit: Option<usize>) -> BoxStream<'static, Result<T>>
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    match limit {
        Some(limit) if limit > 0 => stream.take(limit).boxed(),
        _ => stream.boxed(),
    }
}
