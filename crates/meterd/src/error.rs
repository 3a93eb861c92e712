//! HTTP error mapping

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use meter_api::ErrorBody;
use meter_core::CoreError;
use tracing::error;

/// Error returned by every handler
///
/// Renders as `{ "error": message, "code": CODE }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                CoreError::InvalidAmount(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_AMOUNT", core.to_string())
                }
                CoreError::InvalidRating(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_RATING", core.to_string())
                }
                CoreError::InvalidRequest(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_REQUEST", core.to_string())
                }
                CoreError::InsufficientBalance { .. } => (
                    StatusCode::PAYMENT_REQUIRED,
                    "INSUFFICIENT_BALANCE",
                    core.to_string(),
                ),
                CoreError::SessionNotFound(_) => {
                    (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", core.to_string())
                }
                CoreError::WalletNotFound(_) => {
                    (StatusCode::NOT_FOUND, "WALLET_NOT_FOUND", core.to_string())
                }
                CoreError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", core.to_string())
                }
                CoreError::Store(e) => {
                    error!(error = %e, "Store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        let body = ErrorBody {
            error: message,
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_api::SessionStatus;
    use meter_store::StoreError;
    use rust_decimal_macros::dec;

    #[test]
    fn status_mapping() {
        let cases = [
            (AppError::from(CoreError::invalid_amount("x")), StatusCode::BAD_REQUEST),
            (AppError::from(CoreError::InvalidRating(9)), StatusCode::BAD_REQUEST),
            (
                AppError::from(CoreError::InsufficientBalance {
                    required: dec!(1),
                    available: dec!(0),
                }),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                AppError::from(CoreError::transition(SessionStatus::Completed, "pause")),
                StatusCode::CONFLICT,
            ),
            (AppError::forbidden("no"), StatusCode::FORBIDDEN),
            (AppError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED),
            (
                AppError::from(CoreError::Store(StoreError::LockPoisoned)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn store_errors_are_sanitized() {
        let err = AppError::from(CoreError::Store(StoreError::Database("secret".into())));
        let (_, code, message) = err.parts();
        assert_eq!(code, "INTERNAL_ERROR");
        assert!(!message.contains("secret"));
    }
}
