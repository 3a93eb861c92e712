//! Validated policy structures

use crate::schema::{RawBillingConfig, RawConfig, RawServiceConfig};
use crate::validation::parse_amount;
use meter_util::{MeterError, default_data_dir};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Fractional digits carried by billing arithmetic
pub const BILLING_SCALE: u32 = 10;

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Validated policy ready for use by the core engine
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Service configuration
    pub service: ServiceConfig,

    /// Billing parameters
    pub billing: BillingPolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            billing: BillingPolicy::from_raw(raw.billing),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: String,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            listen_addr: raw
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// What happens to a session whose client can no longer pay for a tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExhaustionPolicy {
    /// Complete the session and settle what was charged
    #[default]
    End,
    /// Pause and wait for a top-up and an explicit resume
    Pause,
}

impl ExhaustionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExhaustionPolicy::End => "end",
            ExhaustionPolicy::Pause => "pause",
        }
    }
}

impl FromStr for ExhaustionPolicy {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "end" => Ok(ExhaustionPolicy::End),
            "pause" => Ok(ExhaustionPolicy::Pause),
            other => Err(MeterError::unknown_variant("exhaustion policy", other)),
        }
    }
}

/// Minutes-remaining bands for the 2-minute and 1-minute warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningThresholds {
    pub two_minute: Decimal,
    pub one_minute: Decimal,
}

impl Default for WarningThresholds {
    fn default() -> Self {
        Self {
            two_minute: Decimal::TWO,
            one_minute: Decimal::ONE,
        }
    }
}

/// Validated billing parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingPolicy {
    pub currency: String,
    pub tick_interval: Duration,
    pub min_session_minutes: u32,
    pub platform_fee_rate: Decimal,
    pub warning_thresholds: WarningThresholds,
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            currency: "USD".into(),
            tick_interval: Duration::from_secs(60),
            min_session_minutes: 1,
            platform_fee_rate: Decimal::new(10, 2),
            warning_thresholds: WarningThresholds::default(),
            on_exhausted: ExhaustionPolicy::End,
        }
    }
}

impl BillingPolicy {
    fn from_raw(raw: RawBillingConfig) -> Self {
        let defaults = Self::default();

        let platform_fee_rate = raw
            .platform_fee_rate
            .as_ref()
            .and_then(|r| parse_amount(r).ok())
            .unwrap_or(defaults.platform_fee_rate);

        let warning_thresholds = raw
            .warning_thresholds_minutes
            .as_deref()
            .and_then(|values| match values {
                [two, one] => Some(WarningThresholds {
                    two_minute: parse_amount(two).ok()?,
                    one_minute: parse_amount(one).ok()?,
                }),
                _ => None,
            })
            .unwrap_or(defaults.warning_thresholds);

        Self {
            currency: raw.currency.unwrap_or(defaults.currency),
            tick_interval: raw
                .tick_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.tick_interval),
            min_session_minutes: raw.min_session_minutes.unwrap_or(defaults.min_session_minutes),
            platform_fee_rate,
            warning_thresholds,
            on_exhausted: raw
                .on_exhausted
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.on_exhausted),
        }
    }

    pub fn tick_seconds(&self) -> u64 {
        self.tick_interval.as_secs()
    }

    /// Amount charged for one tick at `rate_per_minute`
    pub fn charge_per_tick(&self, rate_per_minute: Decimal) -> Decimal {
        (rate_per_minute * Decimal::from(self.tick_seconds()) / Decimal::from(60))
            .round_dp(BILLING_SCALE)
    }

    /// Balance a client needs before a session may start
    pub fn minimum_balance(&self, rate_per_minute: Decimal) -> Decimal {
        rate_per_minute * Decimal::from(self.min_session_minutes)
    }

    /// Split a session's total charge into (advisor earning, platform fee)
    pub fn split_charge(&self, total_charged: Decimal) -> (Decimal, Decimal) {
        let earning = (total_charged * (Decimal::ONE - self.platform_fee_rate)).round_dp(BILLING_SCALE);
        (earning, total_charged - earning)
    }
}
