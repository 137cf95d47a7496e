//! Core types and shared functionality for nutz-rooms.
//!
//! This crate provides:
//! - Cache storage with SQLite backend (named stores, local storage)
//! - Visitor identity resolution
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod identity;

pub use cache::{CacheDb, CachedResponse};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use identity::{Identity, IdentityResolver};
