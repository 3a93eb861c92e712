//! Core error type

use meter_api::SessionStatus;
use meter_store::StoreError;
use meter_util::{ActorId, SessionId};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Invalid rating: {0} (expected 1-5)")]
    InvalidRating(u8),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Wallet not found: {0}")]
    WalletNotFound(ActorId),

    #[error("Cannot {action} a session that is {from}")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn transition(from: SessionStatus, action: &'static str) -> Self {
        Self::InvalidTransition { from, action }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Store(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
