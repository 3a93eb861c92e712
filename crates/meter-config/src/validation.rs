//! Configuration validation

use crate::schema::{RawAmount, RawBillingConfig, RawConfig};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("billing.{field}: {message}")]
    BillingError { field: &'static str, message: String },

    #[error("Invalid amount '{value}': {message}")]
    InvalidAmount { value: String, message: String },

    #[error("Warning thresholds must be two strictly descending positive values, got {0:?}")]
    InvalidThresholds(Vec<String>),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(addr) = &config.service.listen_addr
        && addr.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::GlobalError(format!(
            "service.listen_addr '{}' is not a socket address",
            addr
        )));
    }

    errors.extend(validate_billing(&config.billing));
    errors
}

fn validate_billing(billing: &RawBillingConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(currency) = &billing.currency
        && currency.trim().is_empty()
    {
        errors.push(ValidationError::BillingError {
            field: "currency",
            message: "cannot be empty".into(),
        });
    }

    if billing.tick_interval_seconds == Some(0) {
        errors.push(ValidationError::BillingError {
            field: "tick_interval_seconds",
            message: "must be greater than zero".into(),
        });
    }

    if billing.min_session_minutes == Some(0) {
        errors.push(ValidationError::BillingError {
            field: "min_session_minutes",
            message: "must be greater than zero".into(),
        });
    }

    if let Some(raw) = &billing.platform_fee_rate {
        match parse_amount(raw) {
            Ok(rate) if rate < Decimal::ZERO || rate >= Decimal::ONE => {
                errors.push(ValidationError::BillingError {
                    field: "platform_fee_rate",
                    message: format!("{} is outside [0, 1)", rate),
                });
            }
            Ok(_) => {}
            Err(e) => errors.push(e),
        }
    }

    if let Some(raw) = &billing.warning_thresholds_minutes {
        let parsed: Result<Vec<Decimal>, ValidationError> = raw.iter().map(parse_amount).collect();
        match parsed {
            Ok(values) => {
                let valid = values.len() == 2
                    && values[1] > Decimal::ZERO
                    && values[0] > values[1];
                if !valid {
                    errors.push(ValidationError::InvalidThresholds(
                        values.iter().map(|v| v.to_string()).collect(),
                    ));
                }
            }
            Err(e) => errors.push(e),
        }
    }

    if let Some(mode) = &billing.on_exhausted
        && crate::ExhaustionPolicy::from_str(mode).is_err()
    {
        errors.push(ValidationError::BillingError {
            field: "on_exhausted",
            message: format!("unknown mode '{}', expected \"end\" or \"pause\"", mode),
        });
    }

    errors
}

/// Parse a configured amount into an exact decimal
pub fn parse_amount(raw: &RawAmount) -> Result<Decimal, ValidationError> {
    let text = raw.to_text();
    Decimal::from_str(&text).map_err(|e| ValidationError::InvalidAmount {
        value: text.clone(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn billing(f: impl FnOnce(&mut RawBillingConfig)) -> RawConfig {
        let mut config = RawConfig {
            config_version: 1,
            service: Default::default(),
            billing: Default::default(),
        };
        f(&mut config.billing);
        config
    }

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&billing(|_| {})).is_empty());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&RawAmount::Number(0.1)).unwrap(), dec!(0.1));
        assert_eq!(parse_amount(&RawAmount::Text("0.125".into())).unwrap(), dec!(0.125));
        assert!(parse_amount(&RawAmount::Text("ten".into())).is_err());
    }

    #[test]
    fn reject_zero_interval_and_minutes() {
        let errors = validate_config(&billing(|b| {
            b.tick_interval_seconds = Some(0);
            b.min_session_minutes = Some(0);
        }));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn reject_fee_rate_out_of_range() {
        for rate in [1.0, -0.1, 2.5] {
            let errors = validate_config(&billing(|b| {
                b.platform_fee_rate = Some(RawAmount::Number(rate));
            }));
            assert!(
                errors
                    .iter()
                    .any(|e| matches!(e, ValidationError::BillingError { field: "platform_fee_rate", .. })),
                "rate {} accepted",
                rate
            );
        }
    }

    #[test]
    fn reject_bad_thresholds() {
        for thresholds in [vec![1.0, 2.0], vec![2.0], vec![2.0, 0.0], vec![2.0, 2.0]] {
            let errors = validate_config(&billing(|b| {
                b.warning_thresholds_minutes =
                    Some(thresholds.iter().copied().map(RawAmount::Number).collect());
            }));
            assert!(
                errors.iter().any(|e| matches!(e, ValidationError::InvalidThresholds(_))),
                "thresholds {:?} accepted",
                thresholds
            );
        }
    }

    #[test]
    fn reject_unknown_exhaustion_mode() {
        let errors = validate_config(&billing(|b| b.on_exhausted = Some("refund".into())));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn reject_bad_listen_addr() {
        let mut config = billing(|_| {});
        config.service.listen_addr = Some("localhost".into());
        assert!(matches!(
            validate_config(&config).as_slice(),
            [ValidationError::GlobalError(_)]
        ));
    }
}
