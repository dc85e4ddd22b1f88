// src/core/state/mod.rs

//! Defines the central `ServerState` struct and all related state components.

pub mod cache;
mod core;
mod stats;

pub use cache::{CacheState, FetchLockGuard};
pub use self::core::ServerState;
pub use stats::StatsState;
