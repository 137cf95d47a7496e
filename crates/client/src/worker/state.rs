//! Worker lifecycle states.
//!
//! `Installing -> Activating -> Active`, or `Installing -> Rejected` when a
//! core asset cannot be cached. No other transitions exist.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Installing,
    /// Installed; stale stores are purged on activation.
    Activating,
    Active,
    Rejected,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}
