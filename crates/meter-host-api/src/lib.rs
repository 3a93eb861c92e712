//! Realtime provider interface for meterd
//!
//! The daemon opens rooms, relays balance warnings and removes participants
//! through [`CallHost`]. This crate contains no provider code itself.

mod logging;
mod mock;
mod traits;

pub use logging::*;
pub use mock::*;
pub use traits::*;
