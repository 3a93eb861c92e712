//! Billing tick processor

use meter_api::{BalanceWarning, Session, SessionStatus, WarningKind};
use meter_config::BillingPolicy;
use meter_store::{AuditEvent, AuditEventType, Store};
use meter_util::SessionId;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::{CoreError, CoreResult, Ledger, SessionDebit, WarningTracker, classify, minutes_remaining};

/// Result of one billing evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// One interval was charged
    Charged {
        charged: Decimal,
        new_balance: Decimal,
        /// Warning first reached on this tick, if any
        warning: Option<WarningKind>,
    },
    /// The balance cannot cover the next interval; nothing was charged
    Exhausted { balance: Decimal },
    /// The session is not active
    Skipped { status: SessionStatus },
}

/// A tick outcome plus the warnings it newly recorded, oldest first
#[derive(Debug, Clone)]
pub struct TickReport {
    pub outcome: TickOutcome,
    pub new_warnings: Vec<BalanceWarning>,
}

/// Charges active sessions one interval at a time
pub struct BillingEngine {
    store: Arc<dyn Store>,
    ledger: Ledger,
    policy: BillingPolicy,
    trackers: Mutex<HashMap<SessionId, WarningTracker>>,
}

impl BillingEngine {
    pub fn new(store: Arc<dyn Store>, ledger: Ledger, policy: BillingPolicy) -> Self {
        info!(
            tick_interval_secs = policy.tick_seconds(),
            fee_rate = %policy.platform_fee_rate,
            "Billing engine initialized"
        );

        Self {
            store,
            ledger,
            policy,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    /// Run one tick for a session
    ///
    /// Callers must serialize ticks per session; see
    /// [`crate::SessionManager::tick`].
    pub fn tick(&self, session_id: &SessionId) -> CoreResult<TickReport> {
        let session = self
            .store
            .get_session(session_id)?
            .ok_or_else(|| CoreError::SessionNotFound(session_id.clone()))?;
        self.tick_session(&session)
    }

    fn tick_session(&self, session: &Session) -> CoreResult<TickReport> {
        if session.status != SessionStatus::Active {
            return Ok(TickReport {
                outcome: TickOutcome::Skipped {
                    status: session.status,
                },
                new_warnings: Vec::new(),
            });
        }

        let cost = self.policy.charge_per_tick(session.rate_per_minute);
        let balance = self.ledger.balance(&session.client_id)?;
        let band = classify(
            minutes_remaining(balance, session.rate_per_minute),
            &self.policy.warning_thresholds,
        );

        // Record the band even when the charge cannot be covered
        let mut new_warnings = Vec::new();
        if let Some(kind) = band.filter(|k| *k != WarningKind::ZeroBalance) {
            new_warnings.extend(self.record_warning(session, kind, balance)?);
        }

        if band == Some(WarningKind::ZeroBalance) || balance < cost {
            return self.exhausted(session, balance, new_warnings);
        }

        let tick_seconds = self.policy.tick_seconds();
        match self.ledger.charge_session(session, cost, tick_seconds)? {
            SessionDebit::Applied { new_balance, .. } => {
                debug!(
                    session_id = %session.id,
                    charged = %cost,
                    balance = %new_balance,
                    "Tick charged"
                );

                Ok(TickReport {
                    outcome: TickOutcome::Charged {
                        charged: cost,
                        new_balance,
                        warning: new_warnings.last().map(|w| w.kind),
                    },
                    new_warnings,
                })
            }
            // Lost a race with another debit on the same wallet
            SessionDebit::Insufficient { balance } => self.exhausted(session, balance, new_warnings),
            SessionDebit::Inactive { status } => Ok(TickReport {
                outcome: TickOutcome::Skipped { status },
                new_warnings,
            }),
        }
    }

    fn exhausted(
        &self,
        session: &Session,
        balance: Decimal,
        mut new_warnings: Vec<BalanceWarning>,
    ) -> CoreResult<TickReport> {
        new_warnings.extend(self.record_warning(session, WarningKind::ZeroBalance, balance)?);
        info!(
            session_id = %session.id,
            client_id = %session.client_id,
            balance = %balance,
            "Client balance exhausted"
        );
        Ok(TickReport {
            outcome: TickOutcome::Exhausted { balance },
            new_warnings,
        })
    }

    /// Record a warning once per (session, kind)
    fn record_warning(
        &self,
        session: &Session,
        kind: WarningKind,
        balance: Decimal,
    ) -> CoreResult<Option<BalanceWarning>> {
        let mut trackers = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
        let tracker = trackers.entry(session.id.clone()).or_default();
        if tracker.has_issued(kind) {
            return Ok(None);
        }

        let warning = BalanceWarning {
            session_id: session.id.clone(),
            owner: session.client_id.clone(),
            kind,
            balance,
            created_at: meter_util::now(),
        };
        let fresh = self.store.record_warning(&warning)?;
        tracker.mark_issued(kind);

        if !fresh {
            return Ok(None);
        }

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::WarningIssued {
                session_id: session.id.clone(),
                kind,
                balance,
            }));

        info!(
            session_id = %session.id,
            kind = kind.as_str(),
            balance = %balance,
            "Warning issued"
        );
        Ok(Some(warning))
    }

    /// Drop in-memory warning state for a finished session
    pub fn forget(&self, session_id: &SessionId) {
        let mut trackers = self.trackers.lock().unwrap_or_else(|e| e.into_inner());
        trackers.remove(session_id);
    }
}
