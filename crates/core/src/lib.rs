//! Core types and shared functionality for pagemirror.
//!
//! This crate provides:
//! - The Notion record-map data model
//! - Page cache implementation with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod snapshot;

pub use cache::{CacheDb, CacheStore};
pub use config::AppConfig;
pub use error::Error;
pub use snapshot::{Block, BlockEnvelope, Snapshot};
