//! Command handlers for the redisdb CLI
//!
//! This module contains handlers for table and server-wide operations.

pub mod server;
pub mod table;
