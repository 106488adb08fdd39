//! SCAN / HSCAN options and reply parsing

use crate::{Error, Result};
use fred::prelude::RedisValue;

/// Cursor value that starts and ends a SCAN iteration
pub const SCAN_START: &str = "0";

/// Options for SCAN-family iteration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// `MATCH` glob pattern
    pub pattern: Option<String>,
    /// `COUNT` hint; falls back to the global `scan_count` when unset
    pub count: Option<u32>,
}

impl ScanOptions {
    /// Scan every key
    pub fn all() -> Self {
        Self::default()
    }

    /// Scan keys matching a glob pattern
    pub fn matching(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            count: None,
        }
    }

    /// Set the `COUNT` hint
    #[must_use]
    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Arguments following the cursor: `[MATCH pattern] COUNT n`
    pub(crate) fn to_args(&self) -> Vec<RedisValue> {
        let mut args = Vec::with_capacity(4);
        if let Some(pattern) = &self.pattern {
            args.push("MATCH".into());
            args.push(pattern.as_str().into());
        }
        let count = self.count.unwrap_or_else(crate::config::get_scan_count);
        args.push("COUNT".into());
        args.push(RedisValue::Integer(count as i64));
        args
    }
}

/// Parse a SCAN reply into `(next_cursor, keys)`
pub fn parse_scan_reply(reply: RedisValue) -> Result<(String, Vec<String>)> {
    let (cursor, items) = split_reply(reply)?;
    let keys = items
        .into_iter()
        .map(|item| {
            item.as_string()
                .ok_or_else(|| Error::Serialization("SCAN key is not a string".to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((cursor, keys))
}

/// Parse an HSCAN reply into `(next_cursor, [(field, value)])`
pub fn parse_hscan_reply(reply: RedisValue) -> Result<(String, Vec<(String, Vec<u8>)>)> {
    let (cursor, items) = split_reply(reply)?;
    if items.len() % 2 != 0 {
        return Err(Error::Serialization(
            "HSCAN reply has an odd number of elements".to_string(),
        ));
    }

    let mut entries = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        let field = field
            .as_string()
            .ok_or_else(|| Error::Serialization("HSCAN field is not a string".to_string()))?;
        let value = value_into_bytes(value)
            .ok_or_else(|| Error::Serialization("HSCAN value is null".to_string()))?;
        entries.push((field, value));
    }
    Ok((cursor, entries))
}

/// Raw bytes of a bulk string reply, `None` for nil
pub fn value_into_bytes(value: RedisValue) -> Option<Vec<u8>> {
    match value {
        RedisValue::Null => None,
        RedisValue::Bytes(bytes) => Some(bytes.to_vec()),
        RedisValue::String(s) => Some(s.as_bytes().to_vec()),
        other => other.as_string().map(String::into_bytes),
    }
}

fn split_reply(reply: RedisValue) -> Result<(String, Vec<RedisValue>)> {
    let mut parts = match reply {
        RedisValue::Array(parts) if parts.len() == 2 => parts,
        other => {
            return Err(Error::Serialization(format!(
                "Unexpected SCAN reply: {:?}",
                other
            )))
        }
    };

    let items = parts.pop().map(RedisValue::into_array).unwrap_or_default();
    let cursor = parts
        .pop()
        .and_then(|c| c.as_string())
        .ok_or_else(|| Error::Serialization("SCAN cursor is not a string".to_string()))?;

    Ok((cursor, items))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> RedisValue {
        RedisValue::String(s.into())
    }

    #[test]
    fn test_parse_scan_reply() {
        let reply = RedisValue::Array(vec![
            bulk("17"),
            RedisValue::Array(vec![bulk("t:a"), bulk("t:b")]),
        ]);
        let (cursor, keys) = parse_scan_reply(reply).unwrap();
        assert_eq!(cursor, "17");
        assert_eq!(keys, vec!["t:a".to_string(), "t:b".to_string()]);
    }

    #[test]
    fn test_parse_scan_reply_final_empty_page() {
        let reply = RedisValue::Array(vec![bulk(SCAN_START), RedisValue::Array(vec![])]);
        let (cursor, keys) = parse_scan_reply(reply).unwrap();
        assert_eq!(cursor, SCAN_START);
        assert!(keys.is_empty());
    }

    #[test]
    fn test_parse_scan_reply_malformed() {
        assert!(parse_scan_reply(RedisValue::Null).is_err());
        assert!(parse_scan_reply(RedisValue::Array(vec![bulk("0")])).is_err());
    }

    #[test]
    fn test_parse_hscan_reply() {
        let reply = RedisValue::Array(vec![
            bulk("0"),
            RedisValue::Array(vec![
                bulk("one"),
                RedisValue::Bytes(vec![1u8, 2, 3].into()),
                bulk("two"),
                bulk("2"),
            ]),
        ]);
        let (cursor, entries) = parse_hscan_reply(reply).unwrap();
        assert_eq!(cursor, "0");
        assert_eq!(
            entries,
            vec![
                ("one".to_string(), vec![1u8, 2, 3]),
                ("two".to_string(), b"2".to_vec()),
            ]
        );
    }

    #[test]
    fn test_parse_hscan_reply_odd_items() {
        let reply = RedisValue::Array(vec![bulk("0"), RedisValue::Array(vec![bulk("one")])]);
        assert!(parse_hscan_reply(reply).is_err());
    }

    #[test]
    fn test_scan_args() {
        let args = ScanOptions::matching("t:*").count(10).to_args();
        assert_eq!(
            args,
            vec![
                RedisValue::from("MATCH"),
                RedisValue::from("t:*"),
                RedisValue::from("COUNT"),
                RedisValue::Integer(10),
            ]
        );

        let args = ScanOptions::all().count(5).to_args();
        assert_eq!(args, vec![RedisValue::from("COUNT"), RedisValue::Integer(5)]);
    }

    #[test]
    fn test_value_into_bytes() {
        assert_eq!(value_into_bytes(RedisValue::Null), None);
        assert_eq!(value_into_bytes(bulk("abc")), Some(b"abc".to_vec()));
        assert_eq!(value_into_bytes(RedisValue::Integer(7)), Some(b"7".to_vec()));
    }
}
