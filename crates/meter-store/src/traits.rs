//! Store trait definitions

use chrono::{DateTime, Utc};
use meter_api::{
    AdvisorRating, BalanceWarning, Earning, EarningStatus, Rating, Session, SessionStatus,
    Transaction, TransactionKind, Wallet,
};
use meter_util::{ActorId, EarningId, SessionId};
use rust_decimal::Decimal;

use crate::{AuditEvent, StoreResult};

/// Main store trait
///
/// Every method that touches more than one row runs inside a single
/// database transaction, so callers never observe partial writes.
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Wallets and ledger

    fn get_wallet(&self, owner: &ActorId) -> StoreResult<Option<Wallet>>;

    /// Increase a balance and append the matching ledger entry.
    /// The wallet is created on first credit.
    fn credit_wallet(&self, entry: &LedgerEntry) -> StoreResult<Transaction>;

    /// Check-then-deduct in one transaction.
    ///
    /// With a [`SessionCharge`], the session's counters move in the same
    /// transaction and the debit only applies while the session is active.
    fn debit_wallet(
        &self,
        entry: &LedgerEntry,
        charge: Option<&SessionCharge>,
    ) -> StoreResult<DebitResult>;

    /// Ledger entries for an owner, newest first
    fn get_transactions(&self, owner: &ActorId, limit: Option<u32>) -> StoreResult<Vec<Transaction>>;

    /// Ledger entries referencing a session, oldest first
    fn get_session_transactions(&self, session_id: &SessionId) -> StoreResult<Vec<Transaction>>;

    // Sessions

    fn insert_session(&self, session: &Session) -> StoreResult<()>;

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<Session>>;

    /// Write status, timestamps and end reason, but only while the stored
    /// status is one of `expected`. Billing counters are left untouched.
    ///
    /// Returns false if the stored status did not match.
    fn update_session_state(
        &self,
        session: &Session,
        expected: &[SessionStatus],
    ) -> StoreResult<bool>;

    /// Mark a live session completed with its final figures and insert its
    /// earning. Returns false, writing nothing, if the session is no longer
    /// active or paused.
    fn complete_session(&self, session: &Session, earning: &Earning) -> StoreResult<bool>;

    fn list_sessions(&self, query: &SessionQuery) -> StoreResult<Vec<Session>>;

    // Earnings

    fn get_earnings(
        &self,
        advisor: &ActorId,
        status: Option<EarningStatus>,
    ) -> StoreResult<Vec<Earning>>;

    fn get_session_earning(&self, session_id: &SessionId) -> StoreResult<Option<Earning>>;

    /// Mark the advisor's listed, not yet withdrawn earnings as withdrawn and
    /// credit their total to the advisor's wallet.
    fn withdraw_earnings(
        &self,
        advisor: &ActorId,
        ids: &[EarningId],
        currency: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Withdrawal>;

    // Warnings

    /// Record a warning. Returns false if this kind was already recorded
    /// for the session.
    fn record_warning(&self, warning: &BalanceWarning) -> StoreResult<bool>;

    fn get_warnings(&self, session_id: &SessionId) -> StoreResult<Vec<BalanceWarning>>;

    // Ratings

    /// Insert or replace the rating for a session, copy it onto the session
    /// and return the advisor's recomputed aggregate.
    fn save_rating(&self, rating: &Rating) -> StoreResult<AdvisorRating>;

    fn get_rating(&self, session_id: &SessionId) -> StoreResult<Option<Rating>>;

    fn get_advisor_rating(&self, advisor: &ActorId) -> StoreResult<AdvisorRating>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// A single balance movement to apply
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub owner: ActorId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub session_id: Option<SessionId>,
    pub description: String,
    /// Currency for a wallet created by this entry
    pub currency: String,
    pub at: DateTime<Utc>,
}

/// Counter movement applied together with a session debit
#[derive(Debug, Clone)]
pub struct SessionCharge {
    pub session_id: SessionId,
    pub duration_seconds: u64,
}

/// Result of a debit attempt
#[derive(Debug, Clone, PartialEq)]
pub enum DebitResult {
    /// Funds deducted; the session (if any) was updated too
    Applied {
        transaction: Transaction,
        session: Option<Session>,
    },
    /// Balance below the requested amount; nothing written
    Insufficient { balance: Decimal },
    /// The charged session is not active; nothing written
    SessionNotActive { status: SessionStatus },
}

/// Result of a payout
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub earnings: Vec<Earning>,
    pub amount: Decimal,
    /// Ledger credit for the payout; absent when nothing was withdrawn
    pub transaction: Option<Transaction>,
}

/// Session listing filter
#[derive(Debug, Clone, Default)]
pub struct SessionQuery {
    pub client: Option<ActorId>,
    pub advisor: Option<ActorId>,
    /// Empty matches every status
    pub statuses: Vec<SessionStatus>,
}

impl SessionQuery {
    pub fn for_client(client: ActorId) -> Self {
        Self {
            client: Some(client),
            ..Default::default()
        }
    }

    pub fn for_advisor(advisor: ActorId) -> Self {
        Self {
            advisor: Some(advisor),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.statuses.push(status);
        self
    }
}
