//! Server-wide command handlers

use crate::client::create_client;
use color_eyre::Result;

/// Check the connection
pub async fn ping(redis_url: &str) -> Result<()> {
    let client = create_client(redis_url).await?;
    let reply = client.ping().await?;
    println!("{}", reply);
    client.disconnect().await?;
    Ok(())
}

/// Remove every key in the database
///
/// Refuses to run unless `confirmed` is set.
pub async fn clear_all(redis_url: &str, confirmed: bool) -> Result<()> {
    if !confirmed {
        println!("  ! This removes every key in the database");
        println!("    Re-run with --yes to confirm");
        return Ok(());
    }

    let client = create_client(redis_url).await?;
    let removed = client.clear_all().await?;
    println!("  ✓ Removed {} keys", removed);
    client.disconnect().await?;
    Ok(())
}
