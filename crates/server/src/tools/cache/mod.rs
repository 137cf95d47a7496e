//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and pruning the offline cache.

pub mod purge;
pub mod status;

pub use purge::purge_impl;
pub use status::status_impl;
