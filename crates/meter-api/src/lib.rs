//! Shared types for meterd
//!
//! This crate defines the vocabulary shared by the store, the core engine
//! and the HTTP surface:
//! - Enumerations (session status, channel, transaction kind, warning kind, role)
//! - Records (wallet, transaction, session, earning, balance warning, rating)
//! - HTTP request and response bodies
//! - Versioning

mod records;
mod requests;
mod roles;
mod types;

pub use records::*;
pub use requests::*;
pub use roles::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
