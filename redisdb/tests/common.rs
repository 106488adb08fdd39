//! Common test utilities
//!
//! Shared helper functions and fixtures for integration tests.

#![allow(dead_code)]

use redisdb::storage::RedisClient;

/// Test setup structure
///
/// Manages Redis connection and cleanup for integration tests.
pub struct TestSetup {
    pub redis_url: String,
    pub table: String,
    pub client: RedisClient,
}

impl TestSetup {
    /// Create a new test setup
    ///
    /// # Arguments
    /// * `test_name` - Name of the test (used for table naming)
    pub async fn new(test_name: &str) -> Self {
        init_tracing();

        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let table = format!("test-{}-{}", test_name, uuid::Uuid::new_v4());

        let client = RedisClient::from_url(&redis_url)
            .await
            .expect("Failed to create client");

        Self {
            redis_url,
            table,
            client,
        }
    }

    /// Clean up test data
    ///
    /// Removes both the `table:*` keys and the table hash.
    pub async fn cleanup(&self) {
        let _ = self.client.drop_table(&self.table).await;
        let _ = self.client.del(vec![self.table.clone()]).await;
    }
}

/// Route library logs to the test output, honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Client on a throwaway database for tests that wipe keys
///
/// Uses `REDIS_SCRATCH_URL`, defaulting to database 15 of a local server.
pub async fn scratch_client() -> RedisClient {
    init_tracing();

    let url = std::env::var("REDIS_SCRATCH_URL")
        .unwrap_or_else(|_| "redis://localhost:6379/15".to_string());

    RedisClient::from_url(&url)
        .await
        .expect("Failed to create scratch client")
}

/// FLUSHALL wipes every database, so those tests also need `REDIS_ALLOW_FLUSHALL=1`
pub fn flushall_allowed() -> bool {
    let allowed = std::env::var("REDIS_ALLOW_FLUSHALL").is_ok_and(|v| v == "1");
    if !allowed {
        eprintln!("Skipping: set REDIS_ALLOW_FLUSHALL=1 to run FLUSHALL tests");
    }
    allowed
}

/// Unix timestamp `secs` seconds from now
pub fn expire_in(secs: i64) -> i64 {
    chrono::Utc::now().timestamp() + secs
}

/// Build `(id, value)` tuples from string pairs
pub fn entries(pairs: &[(&str, &str)]) -> Vec<(String, Vec<u8>)> {
    pairs
        .iter()
        .map(|(id, value)| (id.to_string(), value.as_bytes().to_vec()))
        .collect()
}

/// Build a list of owned ids
pub fn ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}
