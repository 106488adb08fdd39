//! redisdb CLI - Command line tool for inspecting redisdb tables

mod client;
mod commands;
mod utils;

use clap::{Parser, Subcommand};
use commands::{server, table};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "redisdb")]
#[command(about = "redisdb CLI - Inspect and edit key-value tables in Redis", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the connection
    Ping,
    /// Count entries in a table
    Count {
        /// Table name
        table: String,
        /// Table is stored as a single hash
        #[arg(long, default_value_t = false)]
        hash: bool,
    },
    /// List ids of a table
    Ids {
        /// Table name
        table: String,
        /// Limit count
        #[arg(long)]
        limit: Option<usize>,
        /// Table is stored as a single hash
        #[arg(long, default_value_t = false)]
        hash: bool,
    },
    /// Show one entry
    Get {
        /// Table name
        table: String,
        /// Entry ID
        id: String,
        /// Table is stored as a single hash
        #[arg(long, default_value_t = false)]
        hash: bool,
    },
    /// Store one entry
    Set {
        /// Table name
        table: String,
        /// Entry ID
        id: String,
        /// Entry value
        value: String,
        /// Expire at this unix timestamp (seconds)
        #[arg(long)]
        expire_at: Option<i64>,
        /// Table is stored as a single hash
        #[arg(long, default_value_t = false)]
        hash: bool,
    },
    /// Increment a counter
    Incr {
        /// Table name
        table: String,
        /// Entry ID
        id: String,
        /// Increment amount
        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        by: i64,
        /// Table is stored as a single hash
        #[arg(long, default_value_t = false)]
        hash: bool,
    },
    /// Remove every entry of a table
    Drop {
        /// Table name
        table: String,
        /// Table is stored as a single hash
        #[arg(long, default_value_t = false)]
        hash: bool,
    },
    /// Remove every key in the database (use with caution)
    ClearAll {
        /// Confirm the removal
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let redis_url = std::env::var("REDIS_URL").unwrap_or("redis://localhost:6379".to_string());
    tracing::debug!("Connecting to {}", utils::redact_url(&redis_url));

    match cli.command {
        Commands::Ping => {
            server::ping(&redis_url).await?;
        }
        Commands::Count { table, hash } => {
            table::count(&redis_url, &table, hash).await?;
        }
        Commands::Ids { table, limit, hash } => {
            table::ids(&redis_url, &table, limit, hash).await?;
        }
        Commands::Get { table, id, hash } => {
            table::get(&redis_url, &table, &id, hash).await?;
        }
        Commands::Set { table, id, value, expire_at, hash } => {
            table::set(&redis_url, &table, &id, &value, expire_at, hash).await?;
        }
        Commands::Incr { table, id, by, hash } => {
            table::incr(&redis_url, &table, &id, by, hash).await?;
        }
        Commands::Drop { table, hash } => {
            table::drop(&redis_url, &table, hash).await?;
        }
        Commands::ClearAll { yes } => {
            server::clear_all(&redis_url, yes).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_with_expiry() {
        let cli = Cli::parse_from(["redisdb", "set", "sessions", "s1", "v", "--expire-at", "1700000000", "--hash"]);
        match cli.command {
            Commands::Set { table, id, value, expire_at, hash } => {
                assert_eq!(table, "sessions");
                assert_eq!(id, "s1");
                assert_eq!(value, "v");
                assert_eq!(expire_at, Some(1_700_000_000));
                assert!(hash);
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn test_parse_incr_negative() {
        let cli = Cli::parse_from(["redisdb", "incr", "counters", "c", "--by", "-3"]);
        match cli.command {
            Commands::Incr { by, hash, .. } => {
                assert_eq!(by, -3);
                assert!(!hash);
            }
            _ => panic!("expected incr"),
        }
    }

    #[test]
    fn test_parse_clear_all_requires_flag_for_confirmation() {
        let cli = Cli::parse_from(["redisdb", "clear-all"]);
        assert!(matches!(cli.command, Commands::ClearAll { yes: false }));
    }
}
