//! Enumerations shared by every layer of meterd

use meter_util::MeterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Channel a consultation runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Chat,
    Video,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Chat => "chat",
            ChannelKind::Video => "video",
        }
    }
}

impl FromStr for ChannelKind {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(ChannelKind::Chat),
            "video" => Ok(ChannelKind::Video),
            other => Err(MeterError::unknown_variant("channel", other)),
        }
    }
}

/// Session state machine
///
/// `Pending -> Active <-> Paused -> Completed | Cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    pub fn can_pause(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }

    pub fn can_resume(&self) -> bool {
        matches!(self, SessionStatus::Paused)
    }

    pub fn can_end(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SessionStatus::Pending),
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            other => Err(MeterError::unknown_variant("session status", other)),
        }
    }
}

/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Add,
    Deduct,
    Refund,
    Earning,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Add => "add",
            TransactionKind::Deduct => "deduct",
            TransactionKind::Refund => "refund",
            TransactionKind::Earning => "earning",
        }
    }

    /// Whether this kind increases the owner's balance
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionKind::Deduct)
    }
}

impl FromStr for TransactionKind {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(TransactionKind::Add),
            "deduct" => Ok(TransactionKind::Deduct),
            "refund" => Ok(TransactionKind::Refund),
            "earning" => Ok(TransactionKind::Earning),
            other => Err(MeterError::unknown_variant("transaction kind", other)),
        }
    }
}

/// Advisor earning lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
    Pending,
    Completed,
    Withdrawn,
}

impl EarningStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningStatus::Pending => "pending",
            EarningStatus::Completed => "completed",
            EarningStatus::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for EarningStatus {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EarningStatus::Pending),
            "completed" => Ok(EarningStatus::Completed),
            "withdrawn" => Ok(EarningStatus::Withdrawn),
            other => Err(MeterError::unknown_variant("earning status", other)),
        }
    }
}

/// Low-balance warning band, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WarningKind {
    #[serde(rename = "2-minute")]
    TwoMinute,
    #[serde(rename = "1-minute")]
    OneMinute,
    #[serde(rename = "zero-balance")]
    ZeroBalance,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKind::TwoMinute => "2-minute",
            WarningKind::OneMinute => "1-minute",
            WarningKind::ZeroBalance => "zero-balance",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WarningKind::ZeroBalance)
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarningKind {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2-minute" => Ok(WarningKind::TwoMinute),
            "1-minute" => Ok(WarningKind::OneMinute),
            "zero-balance" => Ok(WarningKind::ZeroBalance),
            other => Err(MeterError::unknown_variant("warning kind", other)),
        }
    }
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEndReason {
    /// A participant ended the session
    Ended,
    /// The client's wallet could not cover the next tick
    BalanceExhausted,
    /// Cancelled before completion
    Cancelled { reason: Option<String> },
}
