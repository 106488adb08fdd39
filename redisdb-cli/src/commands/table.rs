//! Table command handlers
//!
//! Read and write entries of a key-value table, either stored as one key per
//! entry or as a single hash.

use crate::client::{create_client, key_value_db};
use crate::utils::display_value;
use color_eyre::Result;
use futures::TryStreamExt;
use redisdb::db::{CreateTableOptions, SaveBatchOptions};

/// Count entries in a table
pub async fn count(redis_url: &str, table: &str, hash: bool) -> Result<()> {
    let db = key_value_db(create_client(redis_url).await?, hash);
    let count = db.count(table).await?;
    println!("Table '{}': {} entries", table, count);
    db.close().await?;
    Ok(())
}

/// List ids of a table
pub async fn ids(redis_url: &str, table: &str, limit: Option<usize>, hash: bool) -> Result<()> {
    let db = key_value_db(create_client(redis_url).await?, hash);
    let ids: Vec<String> = db.stream_ids(table, limit).try_collect().await?;

    if ids.is_empty() {
        println!("  (No entries)");
    } else {
        for id in &ids {
            println!("  - {}", id);
        }
    }
    db.close().await?;
    Ok(())
}

/// Print one entry
pub async fn get(redis_url: &str, table: &str, id: &str, hash: bool) -> Result<()> {
    let db = key_value_db(create_client(redis_url).await?, hash);
    let entries = db.get_by_ids(table, &[id.to_string()]).await?;

    match entries.first() {
        Some((_, value)) => println!("{}", display_value(value)),
        None => println!("  ! Entry '{}' not found in '{}'", id, table),
    }
    db.close().await?;
    Ok(())
}

/// Store one entry, optionally expiring at a unix timestamp (seconds)
pub async fn set(
    redis_url: &str,
    table: &str,
    id: &str,
    value: &str,
    expire_at: Option<i64>,
    hash: bool,
) -> Result<()> {
    let db = key_value_db(create_client(redis_url).await?, hash);
    let opts = expire_at.map(SaveBatchOptions::expire_at).unwrap_or_default();
    db.save_batch(table, vec![(id.to_string(), value.as_bytes().to_vec())], opts)
        .await?;

    match expire_at {
        Some(ts) => println!("  ✓ Saved '{}' in '{}' (expires at {})", id, table, ts),
        None => println!("  ✓ Saved '{}' in '{}'", id, table),
    }
    db.close().await?;
    Ok(())
}

/// Increment one counter
pub async fn incr(redis_url: &str, table: &str, id: &str, by: i64, hash: bool) -> Result<()> {
    let db = key_value_db(create_client(redis_url).await?, hash);
    let results = db.increment_batch(table, vec![(id.to_string(), by)]).await?;

    for (id, value) in results {
        println!("{} = {}", id, value);
    }
    db.close().await?;
    Ok(())
}

/// Remove every entry of a table
pub async fn drop(redis_url: &str, table: &str, hash: bool) -> Result<()> {
    let db = key_value_db(create_client(redis_url).await?, hash);
    let before = db.count(table).await?;
    db.create_table(table, CreateTableOptions { drop_if_exists: true })
        .await?;
    println!("Table '{}' dropped, removed {} entries", table, before);
    db.close().await?;
    Ok(())
}
