//! Error types shared across meterd crates

use thiserror::Error;

/// Errors raised while parsing or validating shared primitives
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeterError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl MeterError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn unknown_variant(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnknownVariant {
            kind,
            value: value.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MeterError>;
