//! Client code for nutz-rooms.
//!
//! This crate provides the network boundary, the offline cache manager and
//! its host adapter, and the Supabase session provider.

pub mod fetch;
pub mod supabase;
pub mod worker;

pub use fetch::{FetchConfig, HttpNetwork, Network, Request, Response};
pub use supabase::{SupabaseAuth, SupabaseConfig, SupabaseError};
pub use worker::{
    FetchDecision, OfflineCacheManager, PassReason, ResponseSource, Served, WorkerConfig, WorkerEvent, WorkerHost,
    WorkerState,
};
