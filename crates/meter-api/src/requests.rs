//! HTTP request and response bodies

use meter_util::{ActorId, EarningId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ChannelKind, SessionStatus, SessionTotals, WarningKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub client_id: ActorId,
    pub advisor_id: ActorId,
    #[serde(rename = "type")]
    pub channel: ChannelKind,
    pub rate_per_minute: Decimal,
}

/// Body of `POST /sessions/{id}/end`; an empty body means "use recorded totals"
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_charged: Option<Decimal>,
}

impl EndSessionRequest {
    /// Fill any missing figure from the recorded totals
    pub fn totals(&self, recorded: SessionTotals) -> Option<SessionTotals> {
        if self.duration_seconds.is_none() && self.total_charged.is_none() {
            return None;
        }
        Some(SessionTotals {
            duration_seconds: self.duration_seconds.unwrap_or(recorded.duration_seconds),
            total_charged: self.total_charged.unwrap_or(recorded.total_charged),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelSessionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSessionRequest {
    pub stars: u8,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub session_id: Option<meter_util::SessionId>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub earning_ids: Vec<EarningId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    pub withdrawn: Vec<EarningId>,
    pub amount: Decimal,
    pub new_balance: Decimal,
}

/// Result of one billing tick as reported over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TickResponse {
    Charged {
        charged: Decimal,
        #[serde(rename = "newBalance")]
        new_balance: Decimal,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning: Option<WarningKind>,
    },
    Exhausted {
        #[serde(rename = "shouldPause")]
        should_pause: bool,
        balance: Decimal,
        warning: WarningKind,
        status: SessionStatus,
    },
    Skipped {
        skipped: bool,
        status: SessionStatus,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub owner: ActorId,
    pub balance: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Error payload: `{ "error": message, "code": CODE }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub api_version: u32,
    pub store_healthy: bool,
    pub active_sessions: usize,
}
