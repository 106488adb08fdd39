//! Redis Key manager
//!
//! Maps `(table, id)` pairs to Redis keys and back. Keys have the form
//! `table{sep}id`; the id is recovered by slicing off the table prefix.

/// Default separator between table name and id
pub const DEFAULT_SEPARATOR: &str = ":";

/// Redis Key manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    separator: String,
}

impl Default for Keys {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl Keys {
    /// Create a key manager using the given separator
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Separator between table and id
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Record key
    /// Example: users:a1b2c3
    pub fn id_to_key(&self, table: &str, id: &str) -> String {
        format!("{}{}{}", table, self.separator, id)
    }

    /// Record keys for a batch of ids, same order as `ids`
    pub fn ids_to_keys(&self, table: &str, ids: &[String]) -> Vec<String> {
        ids.iter().map(|id| self.id_to_key(table, id)).collect()
    }

    /// Id part of a record key
    pub fn key_to_id(&self, table: &str, key: &str) -> String {
        let prefix_len = table.len() + self.separator.len();
        key.get(prefix_len..).unwrap_or_default().to_string()
    }

    /// Id parts of a batch of record keys
    pub fn keys_to_ids(&self, table: &str, keys: &[String]) -> Vec<String> {
        keys.iter().map(|key| self.key_to_id(table, key)).collect()
    }

    /// SCAN pattern matching every key of a table
    /// Example: users:*
    pub fn table_pattern(&self, table: &str) -> String {
        format!("{}{}*", table, self.separator)
    }
}
