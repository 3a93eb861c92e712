//! Shared utilities for meterd
//!
//! This crate provides:
//! - ID types (ActorId, SessionId, EarningId)
//! - Wall-clock time with a debug-only mock override
//! - Error types
//! - Default paths for config and data directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
