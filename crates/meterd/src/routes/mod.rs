//! Route tables and handlers

pub mod advisors;
pub mod audit;
pub mod health;
pub mod sessions;
pub mod wallets;

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Parse an optional JSON body; an empty body yields the default
pub(crate) fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_api::{CancelSessionRequest, EndSessionRequest};

    #[test]
    fn empty_body_is_default() {
        let req: EndSessionRequest = optional_body(&Bytes::new()).unwrap();
        assert!(req.duration_seconds.is_none());

        let req: CancelSessionRequest = optional_body(&Bytes::from_static(b"  ")).unwrap();
        assert!(req.reason.is_none());
    }

    #[test]
    fn malformed_body_is_rejected() {
        let result: Result<EndSessionRequest, _> = optional_body(&Bytes::from_static(b"{oops"));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
