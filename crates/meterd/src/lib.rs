//! meterd service internals
//!
//! The binary in `main.rs` wires these together:
//! - HTTP surface (router, actor extraction, error mapping)
//! - Per-session tick scheduler
//! - Dispatch of core and host events

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod router;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use dispatch::{ChannelSink, Dispatcher};
pub use error::{AppError, AppResult};
pub use router::build_router;
pub use scheduler::TickScheduler;
pub use state::AppState;
