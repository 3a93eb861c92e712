//! Wallet ledger
//!
//! Every balance movement is a ledger entry written in the same store
//! transaction as the balance itself, so a wallet's balance always equals
//! the signed sum of its entries.

use meter_api::{Session, SessionStatus, Transaction, TransactionKind, Wallet};
use meter_store::{
    AuditEvent, AuditEventType, DebitResult, LedgerEntry, SessionCharge, Store,
};
use meter_util::{ActorId, SessionId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{CoreError, CoreResult};

/// Outcome of a debit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied { new_balance: Decimal },
    /// Nothing was deducted
    Insufficient { balance: Decimal },
}

/// Outcome of a debit tied to a session tick
#[derive(Debug, Clone, PartialEq)]
pub enum SessionDebit {
    Applied { new_balance: Decimal, session: Session },
    Insufficient { balance: Decimal },
    /// The session stopped being active before the write
    Inactive { status: SessionStatus },
}

/// Result of checking a wallet against its ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub owner: ActorId,
    pub balance: Decimal,
    pub ledger_sum: Decimal,
    pub entries: usize,
    pub consistent: bool,
}

/// Balances and the append-only transaction log
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    currency: String,
}

fn require_positive(amount: Decimal) -> CoreResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CoreError::invalid_amount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    fn entry(
        &self,
        owner: &ActorId,
        kind: TransactionKind,
        amount: Decimal,
        session_id: Option<SessionId>,
        description: String,
    ) -> LedgerEntry {
        LedgerEntry {
            owner: owner.clone(),
            kind,
            amount,
            session_id,
            description,
            currency: self.currency.clone(),
            at: meter_util::now(),
        }
    }

    /// Current balance; an owner without a wallet has zero
    pub fn balance(&self, owner: &ActorId) -> CoreResult<Decimal> {
        Ok(self
            .store
            .get_wallet(owner)?
            .map(|w| w.balance)
            .unwrap_or(Decimal::ZERO))
    }

    pub fn wallet(&self, owner: &ActorId) -> CoreResult<Wallet> {
        self.store
            .get_wallet(owner)?
            .ok_or_else(|| CoreError::WalletNotFound(owner.clone()))
    }

    /// Add funds, creating the wallet on first use. Returns the new balance.
    pub fn credit(
        &self,
        owner: &ActorId,
        amount: Decimal,
        description: Option<String>,
    ) -> CoreResult<Decimal> {
        require_positive(amount)?;
        let description = description.unwrap_or_else(|| "Funds added".into());
        self.apply_credit(owner, TransactionKind::Add, amount, description)
    }

    /// Return funds to a wallet. Returns the new balance.
    pub fn refund(&self, owner: &ActorId, amount: Decimal, reason: &str) -> CoreResult<Decimal> {
        require_positive(amount)?;
        self.apply_credit(owner, TransactionKind::Refund, amount, format!("Refund: {}", reason))
    }

    fn apply_credit(
        &self,
        owner: &ActorId,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    ) -> CoreResult<Decimal> {
        let entry = self.entry(owner, kind, amount, None, description);
        let transaction = self.store.credit_wallet(&entry)?;

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::FundsCredited {
                owner: owner.clone(),
                kind,
                amount,
            }));

        info!(
            owner = %owner,
            kind = kind.as_str(),
            amount = %amount,
            balance = %transaction.balance_after,
            "Wallet credited"
        );
        Ok(transaction.balance_after)
    }

    /// Deduct funds if the balance covers them; never goes negative
    pub fn debit(
        &self,
        owner: &ActorId,
        amount: Decimal,
        session_id: Option<SessionId>,
        description: Option<String>,
    ) -> CoreResult<DebitOutcome> {
        require_positive(amount)?;
        let description = description.unwrap_or_else(|| "Funds deducted".into());
        let entry = self.entry(owner, TransactionKind::Deduct, amount, session_id, description);

        match self.store.debit_wallet(&entry, None)? {
            DebitResult::Applied { transaction, .. } => Ok(DebitOutcome::Applied {
                new_balance: transaction.balance_after,
            }),
            DebitResult::Insufficient { balance } => {
                debug!(owner = %owner, amount = %amount, balance = %balance, "Debit rejected");
                Ok(DebitOutcome::Insufficient { balance })
            }
            // Only reachable with a session charge
            DebitResult::SessionNotActive { .. } => Ok(DebitOutcome::Insufficient {
                balance: self.balance(owner)?,
            }),
        }
    }

    /// Deduct one tick for an active session and advance its counters in
    /// the same store transaction
    pub fn charge_session(
        &self,
        session: &Session,
        amount: Decimal,
        duration_seconds: u64,
    ) -> CoreResult<SessionDebit> {
        require_positive(amount)?;
        let entry = self.entry(
            &session.client_id,
            TransactionKind::Deduct,
            amount,
            Some(session.id.clone()),
            format!("Session billing - {}/min", session.rate_per_minute),
        );
        let charge = SessionCharge {
            session_id: session.id.clone(),
            duration_seconds,
        };

        Ok(match self.store.debit_wallet(&entry, Some(&charge))? {
            DebitResult::Applied {
                transaction,
                session: Some(updated),
            } => SessionDebit::Applied {
                new_balance: transaction.balance_after,
                session: updated,
            },
            DebitResult::Applied { .. } => {
                return Err(CoreError::SessionNotFound(session.id.clone()));
            }
            DebitResult::Insufficient { balance } => SessionDebit::Insufficient { balance },
            DebitResult::SessionNotActive { status } => SessionDebit::Inactive { status },
        })
    }

    /// Ledger entries for an owner, newest first
    pub fn transactions(&self, owner: &ActorId, limit: Option<u32>) -> CoreResult<Vec<Transaction>> {
        Ok(self.store.get_transactions(owner, limit)?)
    }

    pub fn session_transactions(&self, session_id: &SessionId) -> CoreResult<Vec<Transaction>> {
        Ok(self.store.get_session_transactions(session_id)?)
    }

    /// Compare a wallet's balance against the sum of its ledger
    pub fn reconcile(&self, owner: &ActorId) -> CoreResult<Reconciliation> {
        let balance = self.balance(owner)?;
        let entries = self.store.get_transactions(owner, None)?;
        let ledger_sum: Decimal = entries.iter().map(Transaction::signed_amount).sum();

        Ok(Reconciliation {
            owner: owner.clone(),
            balance,
            ledger_sum,
            entries: entries.len(),
            consistent: balance == ledger_sum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_store::SqliteStore;
    use rust_decimal_macros::dec;
    use std::thread;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(SqliteStore::in_memory().unwrap()), "USD")
    }

    #[test]
    fn missing_wallet_has_zero_balance() {
        let ledger = ledger();
        let owner = ActorId::new("nobody");
        assert_eq!(ledger.balance(&owner).unwrap(), Decimal::ZERO);
        assert!(matches!(
            ledger.wallet(&owner),
            Err(CoreError::WalletNotFound(_))
        ));
        assert_eq!(
            ledger.debit(&owner, dec!(1), None, None).unwrap(),
            DebitOutcome::Insufficient { balance: dec!(0) }
        );
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let ledger = ledger();
        let owner = ActorId::new("c");
        assert!(matches!(
            ledger.credit(&owner, dec!(0), None),
            Err(CoreError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.debit(&owner, dec!(-1), None, None),
            Err(CoreError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.refund(&owner, dec!(0), "x"),
            Err(CoreError::InvalidAmount(_))
        ));
        assert!(ledger.transactions(&owner, None).unwrap().is_empty());
    }

    #[test]
    fn debit_never_clamps() {
        let ledger = ledger();
        let owner = ActorId::new("c");
        ledger.credit(&owner, dec!(3), None).unwrap();

        assert_eq!(
            ledger.debit(&owner, dec!(3.01), None, None).unwrap(),
            DebitOutcome::Insufficient { balance: dec!(3) }
        );
        assert_eq!(ledger.balance(&owner).unwrap(), dec!(3));
        assert_eq!(
            ledger.debit(&owner, dec!(3), None, None).unwrap(),
            DebitOutcome::Applied { new_balance: dec!(0) }
        );
    }

    #[test]
    fn balance_matches_ledger_sum() {
        let ledger = ledger();
        let owner = ActorId::new("c");
        ledger.credit(&owner, dec!(10), Some("top-up".into())).unwrap();
        ledger.debit(&owner, dec!(2.5), None, None).unwrap();
        ledger.refund(&owner, dec!(1.25), "dispute").unwrap();
        ledger.debit(&owner, dec!(100), None, None).unwrap();

        let report = ledger.reconcile(&owner).unwrap();
        assert!(report.consistent);
        assert_eq!(report.balance, dec!(8.75));
        assert_eq!(report.entries, 3);

        let history = ledger.transactions(&owner, Some(2)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Refund);
    }

    #[test]
    fn concurrent_debits_succeed_once() {
        let ledger = ledger();
        let owner = ActorId::new("c");
        ledger.credit(&owner, dec!(1), None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                let owner = owner.clone();
                thread::spawn(move || ledger.debit(&owner, dec!(1), None, None).unwrap())
            })
            .collect();

        let applied = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| matches!(o, DebitOutcome::Applied { .. }))
            .count();

        assert_eq!(applied, 1);
        assert_eq!(ledger.balance(&owner).unwrap(), Decimal::ZERO);
        assert!(ledger.reconcile(&owner).unwrap().consistent);
    }
}
