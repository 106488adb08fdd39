//! Redis Pipeline
//!
//! Commands are collected by value and sent in a single round trip on
//! [`execute`](RedisPipeline::execute).

use crate::Result;
use fred::{
    clients::RedisPool,
    interfaces::*,
    types::{Expiration, RedisKey, RedisValue},
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Set {
        key: String,
        value: RedisValue,
        expire_at: Option<i64>,
    },
    Del {
        keys: Vec<String>,
    },
    IncrBy {
        key: String,
        by: i64,
    },
    HIncrBy {
        key: String,
        field: String,
        by: i64,
    },
}

/// Redis Pipeline
pub struct RedisPipeline {
    pool: Arc<RedisPool>,
    commands: Vec<Command>,
}

impl RedisPipeline {
    pub(super) fn new(pool: Arc<RedisPool>) -> Self {
        Self {
            pool,
            commands: Vec::new(),
        }
    }

    /// Add SET command
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<RedisValue>) -> Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
            expire_at: None,
        });
        self
    }

    /// Add SET ... EXAT command
    #[must_use]
    pub fn set_with_ttl(mut self, key: impl Into<String>, value: impl Into<RedisValue>, expire_at: i64) -> Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
            expire_at: Some(expire_at),
        });
        self
    }

    /// Add DEL command; an empty key list is skipped
    #[must_use]
    pub fn del(mut self, keys: Vec<String>) -> Self {
        if !keys.is_empty() {
            self.commands.push(Command::Del { keys });
        }
        self
    }

    /// Add INCRBY command
    #[must_use]
    pub fn incr_by(mut self, key: impl Into<String>, by: i64) -> Self {
        self.commands.push(Command::IncrBy { key: key.into(), by });
        self
    }

    /// Add HINCRBY command
    #[must_use]
    pub fn hincr_by(mut self, key: impl Into<String>, field: impl Into<String>, by: i64) -> Self {
        self.commands.push(Command::HIncrBy {
            key: key.into(),
            field: field.into(),
            by,
        });
        self
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no command is queued
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Execute all commands, returning one reply per command in order
    pub async fn execute(self) -> Result<Vec<RedisValue>> {
        if self.commands.is_empty() {
            return Ok(Vec::new());
        }

        let count = self.commands.len();
        let pipeline = self.pool.next().pipeline();
        for command in self.commands {
            match command {
                Command::Set { key, value, expire_at } => {
                    let _: () = pipeline
                        .set(key, value, expire_at.map(Expiration::EXAT), None, false)
                        .await?;
                }
                Command::Del { keys } => {
                    let keys: Vec<RedisKey> = keys.into_iter().map(RedisKey::from).collect();
                    let _: () = pipeline.del(keys).await?;
                }
                Command::IncrBy { key, by } => {
                    let _: () = pipeline.incr_by(key, by).await?;
                }
                Command::HIncrBy { key, field, by } => {
                    let _: () = pipeline.hincrby(key, field, by).await?;
                }
            }
        }

        let replies: RedisValue = pipeline.all().await?;
        let replies = replies.into_array();
        tracing::debug!("redis: pipeline executed {} commands", count);
        Ok(replies)
    }
}

impl std::fmt::Debug for RedisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPipeline")
            .field("commands", &self.commands)
            .finish()
    }
}
