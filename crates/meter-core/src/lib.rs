//! Billing core for meterd
//!
//! This crate is the heart of meterd, containing:
//! - Wallet ledger (credits, atomic debits, refunds, reconciliation)
//! - Warning and termination policy (minutes-remaining bands)
//! - Billing tick processor (one charge per interval per active session)
//! - Session state machine (Active <-> Paused -> Completed | Cancelled)
//! - Earnings book (advisor earnings and payouts)

mod earnings;
mod engine;
mod error;
mod events;
mod ledger;
mod policy;
mod session;

pub use earnings::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use ledger::*;
pub use policy::*;
pub use session::*;
