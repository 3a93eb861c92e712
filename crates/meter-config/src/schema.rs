//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Billing parameters
    #[serde(default)]
    pub billing: RawBillingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// HTTP listen address (default: 127.0.0.1:8080)
    pub listen_addr: Option<String>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,
}

/// Billing parameters
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBillingConfig {
    /// ISO currency code recorded on new wallets
    pub currency: Option<String>,

    /// Seconds between ticks for an active session
    pub tick_interval_seconds: Option<u64>,

    /// Minutes of funds a client needs to start a session
    pub min_session_minutes: Option<u32>,

    /// Share of each charge retained by the platform, in [0, 1)
    pub platform_fee_rate: Option<RawAmount>,

    /// Minutes-remaining thresholds, most lenient first
    pub warning_thresholds_minutes: Option<Vec<RawAmount>>,

    /// "end" or "pause"
    pub on_exhausted: Option<String>,
}

/// A decimal written either as a TOML number or as a string
///
/// Strings keep full precision; numbers go through their shortest
/// round-trip representation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    Text(String),
    Number(f64),
}

impl RawAmount {
    pub fn to_text(&self) -> String {
        match self {
            RawAmount::Text(s) => s.trim().to_string(),
            RawAmount::Number(n) => n.to_string(),
        }
    }
}
