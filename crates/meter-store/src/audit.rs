//! Audit event types

use chrono::{DateTime, Utc};
use meter_api::{SessionEndReason, TransactionKind, WarningKind};
use meter_util::{ActorId, SessionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Configuration loaded
    ConfigLoaded {
        tick_interval_seconds: u64,
        platform_fee_rate: Decimal,
    },

    /// Session started
    SessionStarted {
        session_id: SessionId,
        client_id: ActorId,
        advisor_id: ActorId,
        rate_per_minute: Decimal,
    },

    SessionPaused { session_id: SessionId },

    SessionResumed { session_id: SessionId },

    /// Session completed and settled
    SessionEnded {
        session_id: SessionId,
        reason: SessionEndReason,
        duration_seconds: u64,
        total_charged: Decimal,
        advisor_earning: Decimal,
    },

    SessionCancelled {
        session_id: SessionId,
        reason: Option<String>,
    },

    /// Low-balance warning issued
    WarningIssued {
        session_id: SessionId,
        kind: WarningKind,
        balance: Decimal,
    },

    /// Funds added to a wallet outside of session billing
    FundsCredited {
        owner: ActorId,
        kind: TransactionKind,
        amount: Decimal,
    },

    SessionRated {
        session_id: SessionId,
        advisor_id: ActorId,
        stars: u8,
    },

    /// Earnings paid out to the advisor's wallet
    EarningsWithdrawn {
        advisor_id: ActorId,
        count: usize,
        amount: Decimal,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Utc>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: meter_util::now(),
            event,
        }
    }
}
