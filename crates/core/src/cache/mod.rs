//! SQLite-backed page cache.
//!
//! This module provides the persistent cache for rewritten page snapshots,
//! using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - One entry per page ID, serialized record map as the value
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//!
//! Entries are never expired by this service (no TTL); `put` overwrites and
//! the last writer wins.

pub mod connection;
pub mod migrations;
pub mod pages;

pub use crate::Error;

pub use connection::CacheDb;
pub use pages::{CacheStore, CachedEntry};
