//! Persisted domain records
//!
//! Every amount is a [`Decimal`]; JSON renders them as decimal strings.

use chrono::{DateTime, Utc};
use meter_util::{ActorId, EarningId, SessionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ChannelKind, EarningStatus, SessionEndReason, SessionStatus, TransactionKind, WarningKind};

/// A stored balance owned by one actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub owner: ActorId,
    pub balance: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One append-only ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub owner: ActorId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Balance immediately after this entry was applied
    pub balance_after: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Contribution of this entry to the owner's balance
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// A metered consultation between one client and one advisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub client_id: ActorId,
    pub advisor_id: ActorId,
    #[serde(rename = "type")]
    pub channel: ChannelKind,
    pub rate_per_minute: Decimal,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    pub total_duration_seconds: u64,
    pub total_charged: Decimal,
    pub client_wallet_before: Decimal,
    pub client_wallet_after: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisor_earning: Option<Decimal>,
    pub last_activity_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<SessionEndReason>,
}

impl Session {
    /// A freshly started session with zeroed counters
    pub fn start(
        client_id: ActorId,
        advisor_id: ActorId,
        channel: ChannelKind,
        rate_per_minute: Decimal,
        wallet_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            client_id,
            advisor_id,
            channel,
            rate_per_minute,
            status: SessionStatus::Active,
            start_time: now,
            end_time: None,
            paused_at: None,
            total_duration_seconds: 0,
            total_charged: Decimal::ZERO,
            client_wallet_before: wallet_balance,
            client_wallet_after: wallet_balance,
            advisor_earning: None,
            last_activity_time: now,
            rating: None,
            feedback: None,
            end_reason: None,
        }
    }

    pub fn totals(&self) -> SessionTotals {
        SessionTotals {
            duration_seconds: self.total_duration_seconds,
            total_charged: self.total_charged,
        }
    }

    pub fn involves(&self, actor: &ActorId) -> bool {
        &self.client_id == actor || &self.advisor_id == actor
    }
}

/// Final figures handed to `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTotals {
    pub duration_seconds: u64,
    pub total_charged: Decimal,
}

/// Advisor's share of one completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Earning {
    pub id: EarningId,
    pub advisor_id: ActorId,
    pub session_id: SessionId,
    pub client_id: ActorId,
    #[serde(rename = "type")]
    pub channel: ChannelKind,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub duration_seconds: u64,
    pub status: EarningStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn_at: Option<DateTime<Utc>>,
}

/// Rollup of an advisor's earnings by status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsSummary {
    pub total_pending: Decimal,
    pub total_completed: Decimal,
    pub total_withdrawn: Decimal,
    /// Completed plus withdrawn
    pub total_earnings: Decimal,
    pub total_sessions: u32,
    pub total_hours: Decimal,
    pub available_for_withdrawal: Decimal,
}

/// A low-balance notice recorded against a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceWarning {
    pub session_id: SessionId,
    pub owner: ActorId,
    pub kind: WarningKind,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A client's review of a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub session_id: SessionId,
    pub client_id: ActorId,
    pub advisor_id: ActorId,
    pub stars: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate of every rating an advisor has received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorRating {
    pub advisor_id: ActorId,
    /// Mean stars rounded to two places; zero when unrated
    pub average: Decimal,
    pub count: u32,
}
