//! redisdb global configuration module
//!
//! Provides centralized settings for scanning and streaming behaviour shared by
//! every backend in the process.

use std::sync::RwLock;
use once_cell::sync::Lazy;

/// redisdb global configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisdbConfig {
    /// `COUNT` hint passed to SCAN/HSCAN (default: 100)
    ///
    /// This is a batch size hint for the server, not a result limit.
    pub scan_count: u32,

    /// Maximum number of MGET batches in flight while streaming values (default: 16)
    pub stream_concurrency: usize,
}

impl Default for RedisdbConfig {
    fn default() -> Self {
        Self {
            scan_count: 100,
            stream_concurrency: 16,
        }
    }
}

impl RedisdbConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SCAN count hint
    #[must_use]
    pub fn with_scan_count(mut self, count: u32) -> Self {
        self.scan_count = count.max(1);
        self
    }

    /// Set the streaming concurrency
    #[must_use]
    pub fn with_stream_concurrency(mut self, concurrency: usize) -> Self {
        self.stream_concurrency = concurrency.max(1);
        self
    }
}

static GLOBAL_CONFIG: Lazy<RwLock<RedisdbConfig>> =
    Lazy::new(|| RwLock::new(RedisdbConfig::default()));

/// Get the current global configuration
pub fn get_config() -> RedisdbConfig {
    match GLOBAL_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => {
            tracing::error!("Global config lock poisoned, using last written value");
            poisoned.into_inner().clone()
        }
    }
}

/// Set the global configuration
pub fn set_config(config: RedisdbConfig) {
    update_config(|global| *global = config);
}

/// Update the global configuration in place
///
/// # Example
///
/// ```rust
/// use redisdb::config::update_config;
///
/// update_config(|config| {
///     config.stream_concurrency = 4;
/// });
/// ```
pub fn update_config<F>(modifier: F)
where
    F: FnOnce(&mut RedisdbConfig),
{
    let mut global = match GLOBAL_CONFIG.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    modifier(&mut global);
    tracing::info!("Global redisdb configuration updated");
}

/// Get the SCAN count hint
pub fn get_scan_count() -> u32 {
    get_config().scan_count
}

/// Get the streaming concurrency
pub fn get_stream_concurrency() -> usize {
    get_config().stream_concurrency
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests touching the global config run serially
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_default_config() {
        let config = RedisdbConfig::default();
        assert_eq!(config.scan_count, 100);
        assert_eq!(config.stream_concurrency, 16);
    }

    #[test]
    fn test_config_builder_clamps_zero() {
        let config = RedisdbConfig::new()
            .with_scan_count(0)
            .with_stream_concurrency(0);
        assert_eq!(config.scan_count, 1);
        assert_eq!(config.stream_concurrency, 1);

        let config = RedisdbConfig::new()
            .with_scan_count(500)
            .with_stream_concurrency(4);
        assert_eq!(config.scan_count, 500);
        assert_eq!(config.stream_concurrency, 4);
    }

    #[test]
    fn test_global_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        let original = get_config();

        set_config(RedisdbConfig::new().with_scan_count(42));
        assert_eq!(get_scan_count(), 42);

        update_config(|c| c.stream_concurrency = 3);
        assert_eq!(get_stream_concurrency(), 3);
        assert_eq!(get_scan_count(), 42);

        set_config(original);
    }
}
