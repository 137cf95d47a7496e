//! SQLite-backed cache storage.
//!
//! This module provides the storage half of the offline cache: named stores
//! of request/response entries, plus the small key/value table that keeps
//! the anonymous visitor identifier. Access is async via tokio-rusqlite.
//!
//! - Request-addressed keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Store deletion cascades to entries (generation rollover)

pub mod connection;
pub mod hash;
pub mod local;
pub mod migrations;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use stores::CachedResponse;
