//! Session lifecycle
//!
//! `Active <-> Paused -> Completed | Cancelled`. Every mutation of one
//! session runs under that session's lock, so a tick in flight finishes
//! before a pause, end or cancel applies.

use meter_api::{
    AdvisorRating, BalanceWarning, ChannelKind, Earning, EarningStatus, Rating, Session,
    SessionEndReason, SessionStatus, SessionTotals,
};
use meter_config::{BillingPolicy, ExhaustionPolicy};
use meter_store::{AuditEvent, AuditEventType, SessionQuery, Store};
use meter_util::{ActorId, EarningId, SessionId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    BillingEngine, CoreError, CoreEvent, CoreResult, EventSink, Ledger, TickOutcome,
};

/// A completed session and its earning
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub session: Session,
    pub earning: Earning,
}

/// A tick outcome and the session status after the exhaustion policy ran
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    pub outcome: TickOutcome,
    pub status: SessionStatus,
}

/// Owns the session state machine
pub struct SessionManager {
    store: Arc<dyn Store>,
    ledger: Ledger,
    engine: BillingEngine,
    policy: BillingPolicy,
    events: Arc<dyn EventSink>,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, policy: BillingPolicy, events: Arc<dyn EventSink>) -> Self {
        let ledger = Ledger::new(store.clone(), policy.currency.clone());
        let engine = BillingEngine::new(store.clone(), ledger.clone(), policy.clone());

        Self {
            store,
            ledger,
            engine,
            policy,
            events,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn policy(&self) -> &BillingPolicy {
        &self.policy
    }

    /// Run `f` while holding the session's lock
    ///
    /// Lock entries live only while some caller holds or waits on them.
    fn with_lock<T>(&self, id: &SessionId, f: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(id.clone()).or_default().clone()
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };

        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(id)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2)
        {
            locks.remove(id);
        }
        result
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn load(&self, id: &SessionId) -> CoreResult<Session> {
        self.store
            .get_session(id)?
            .ok_or_else(|| CoreError::SessionNotFound(id.clone()))
    }

    /// Start a session if the client can afford the minimum
    pub fn create(
        &self,
        client: &ActorId,
        advisor: &ActorId,
        channel: ChannelKind,
        rate_per_minute: Decimal,
    ) -> CoreResult<Session> {
        if rate_per_minute <= Decimal::ZERO {
            return Err(CoreError::invalid_amount(format!(
                "rate per minute must be positive, got {}",
                rate_per_minute
            )));
        }
        if client == advisor {
            return Err(CoreError::InvalidRequest(
                "client and advisor must differ".into(),
            ));
        }

        let balance = self.ledger.balance(client)?;
        let required = self.policy.minimum_balance(rate_per_minute);
        if balance < required {
            info!(
                client_id = %client,
                balance = %balance,
                required = %required,
                "Session creation rejected"
            );
            return Err(CoreError::InsufficientBalance {
                required,
                available: balance,
            });
        }

        let session = Session::start(
            client.clone(),
            advisor.clone(),
            channel,
            rate_per_minute,
            balance,
            meter_util::now(),
        );
        self.store.insert_session(&session)?;

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::SessionStarted {
                session_id: session.id.clone(),
                client_id: client.clone(),
                advisor_id: advisor.clone(),
                rate_per_minute,
            }));

        info!(
            session_id = %session.id,
            client_id = %client,
            advisor_id = %advisor,
            rate = %rate_per_minute,
            channel = channel.as_str(),
            "Session started"
        );

        self.events.emit(CoreEvent::SessionStarted {
            session: session.clone(),
        });
        Ok(session)
    }

    pub fn get(&self, id: &SessionId) -> CoreResult<Session> {
        self.load(id)
    }

    pub fn pause(&self, id: &SessionId) -> CoreResult<Session> {
        self.with_lock(id, || self.pause_locked(id, false))
    }

    fn pause_locked(&self, id: &SessionId, exhausted: bool) -> CoreResult<Session> {
        let mut session = self.load(id)?;
        if !session.status.can_pause() {
            return Err(CoreError::transition(session.status, "pause"));
        }

        let now = meter_util::now();
        session.status = SessionStatus::Paused;
        session.paused_at = Some(now);
        session.last_activity_time = now;
        self.apply_state(&session, &[SessionStatus::Active], "pause")?;

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::SessionPaused {
                session_id: id.clone(),
            }));
        info!(session_id = %id, exhausted, "Session paused");

        self.events.emit(CoreEvent::SessionPaused {
            session_id: id.clone(),
            exhausted,
        });
        Ok(session)
    }

    pub fn resume(&self, id: &SessionId) -> CoreResult<Session> {
        self.with_lock(id, || {
            let mut session = self.load(id)?;
            if !session.status.can_resume() {
                return Err(CoreError::transition(session.status, "resume"));
            }

            session.status = SessionStatus::Active;
            session.paused_at = None;
            session.last_activity_time = meter_util::now();
            self.apply_state(&session, &[SessionStatus::Paused], "resume")?;

            let _ = self
                .store
                .append_audit(AuditEvent::new(AuditEventType::SessionResumed {
                    session_id: id.clone(),
                }));
            info!(session_id = %id, "Session resumed");

            self.events.emit(CoreEvent::SessionResumed {
                session_id: id.clone(),
            });
            Ok(session)
        })
    }

    /// Conditional state write; a mismatch means another writer got there first
    fn apply_state(
        &self,
        session: &Session,
        expected: &[SessionStatus],
        action: &'static str,
    ) -> CoreResult<()> {
        if self.store.update_session_state(session, expected)? {
            return Ok(());
        }
        let current = self.load(&session.id)?;
        Err(CoreError::transition(current.status, action))
    }

    /// Complete a session and write its earning
    ///
    /// Ending an already completed session returns the stored settlement.
    pub fn end(&self, id: &SessionId, totals: Option<SessionTotals>) -> CoreResult<Settlement> {
        self.with_lock(id, || {
            let session = self.load(id)?;
            self.finish_locked(session, totals, SessionEndReason::Ended)
        })
    }

    fn finish_locked(
        &self,
        mut session: Session,
        totals: Option<SessionTotals>,
        reason: SessionEndReason,
    ) -> CoreResult<Settlement> {
        match session.status {
            SessionStatus::Completed => return self.settlement(session),
            status if !status.can_end() => return Err(CoreError::transition(status, "end")),
            _ => {}
        }

        let recorded = session.totals();
        let totals = match totals {
            Some(supplied) => {
                if supplied.total_charged < Decimal::ZERO {
                    return Err(CoreError::invalid_amount("total charged cannot be negative"));
                }
                if supplied.duration_seconds < recorded.duration_seconds
                    || supplied.total_charged < recorded.total_charged
                {
                    return Err(CoreError::invalid_amount(format!(
                        "final totals ({}s, {}) are below recorded ({}s, {})",
                        supplied.duration_seconds,
                        supplied.total_charged,
                        recorded.duration_seconds,
                        recorded.total_charged
                    )));
                }
                supplied
            }
            None => recorded,
        };

        let (amount, platform_fee) = self.policy.split_charge(totals.total_charged);
        let now = meter_util::now();

        session.status = SessionStatus::Completed;
        session.end_time = Some(now);
        session.paused_at = None;
        session.total_duration_seconds = totals.duration_seconds;
        session.total_charged = totals.total_charged;
        session.advisor_earning = Some(amount);
        session.last_activity_time = now;
        session.end_reason = Some(reason.clone());

        let earning = Earning {
            id: EarningId::new(),
            advisor_id: session.advisor_id.clone(),
            session_id: session.id.clone(),
            client_id: session.client_id.clone(),
            channel: session.channel,
            amount,
            platform_fee,
            duration_seconds: totals.duration_seconds,
            status: EarningStatus::Pending,
            created_at: now,
            withdrawn_at: None,
        };

        if !self.store.complete_session(&session, &earning)? {
            // Another writer finished it between our read and write
            let current = self.load(&session.id)?;
            return match current.status {
                SessionStatus::Completed => self.settlement(current),
                status => Err(CoreError::transition(status, "end")),
            };
        }

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::SessionEnded {
                session_id: session.id.clone(),
                reason: reason.clone(),
                duration_seconds: totals.duration_seconds,
                total_charged: totals.total_charged,
                advisor_earning: amount,
            }));

        info!(
            session_id = %session.id,
            duration = %meter_util::format_duration_secs(totals.duration_seconds),
            total_charged = %totals.total_charged,
            advisor_earning = %amount,
            reason = ?reason,
            "Session ended"
        );

        self.engine.forget(&session.id);
        self.events.emit(CoreEvent::SessionEnded {
            session_id: session.id.clone(),
            reason,
            duration_seconds: totals.duration_seconds,
            total_charged: totals.total_charged,
            advisor_earning: amount,
        });

        Ok(Settlement { session, earning })
    }

    fn settlement(&self, session: Session) -> CoreResult<Settlement> {
        let earning = self
            .store
            .get_session_earning(&session.id)?
            .ok_or_else(|| CoreError::SessionNotFound(session.id.clone()))?;
        Ok(Settlement { session, earning })
    }

    /// Cancel without settlement; nothing is refunded
    pub fn cancel(&self, id: &SessionId, reason: Option<String>) -> CoreResult<Session> {
        self.with_lock(id, || {
            let mut session = self.load(id)?;
            if !session.status.can_cancel() {
                return Err(CoreError::transition(session.status, "cancel"));
            }

            let previous = session.status;
            let now = meter_util::now();
            session.status = SessionStatus::Cancelled;
            session.end_time = Some(now);
            session.paused_at = None;
            session.last_activity_time = now;
            session.end_reason = Some(SessionEndReason::Cancelled {
                reason: reason.clone(),
            });
            self.apply_state(&session, &[previous], "cancel")?;

            let _ = self
                .store
                .append_audit(AuditEvent::new(AuditEventType::SessionCancelled {
                    session_id: id.clone(),
                    reason: reason.clone(),
                }));
            info!(session_id = %id, reason = ?reason, "Session cancelled");

            self.engine.forget(id);
            self.events.emit(CoreEvent::SessionCancelled {
                session_id: id.clone(),
                reason,
            });
            Ok(session)
        })
    }

    /// Record the client's rating of a completed session
    pub fn rate(
        &self,
        id: &SessionId,
        stars: u8,
        feedback: Option<String>,
    ) -> CoreResult<AdvisorRating> {
        if !(1..=5).contains(&stars) {
            return Err(CoreError::InvalidRating(stars));
        }

        let session = self.load(id)?;
        if session.status != SessionStatus::Completed {
            return Err(CoreError::transition(session.status, "rate"));
        }

        let rating = Rating {
            session_id: session.id.clone(),
            client_id: session.client_id.clone(),
            advisor_id: session.advisor_id.clone(),
            stars,
            feedback: feedback.filter(|f| !f.trim().is_empty()),
            created_at: meter_util::now(),
        };
        let aggregate = self.store.save_rating(&rating)?;

        let _ = self
            .store
            .append_audit(AuditEvent::new(AuditEventType::SessionRated {
                session_id: id.clone(),
                advisor_id: session.advisor_id.clone(),
                stars,
            }));
        info!(
            session_id = %id,
            advisor_id = %session.advisor_id,
            stars,
            average = %aggregate.average,
            "Session rated"
        );

        Ok(aggregate)
    }

    /// Run one billing tick and apply the exhaustion policy
    pub fn tick(&self, id: &SessionId) -> CoreResult<TickResult> {
        self.with_lock(id, || {
            let report = self.engine.tick(id)?;

            for warning in &report.new_warnings {
                self.events.emit(CoreEvent::Warning {
                    session_id: id.clone(),
                    client_id: warning.owner.clone(),
                    kind: warning.kind,
                    balance: warning.balance,
                });
            }

            let status = match &report.outcome {
                TickOutcome::Charged {
                    charged,
                    new_balance,
                    ..
                } => {
                    self.events.emit(CoreEvent::Charged {
                        session_id: id.clone(),
                        charged: *charged,
                        new_balance: *new_balance,
                    });
                    SessionStatus::Active
                }
                TickOutcome::Skipped { status } => {
                    debug!(session_id = %id, status = %status, "Tick skipped");
                    *status
                }
                TickOutcome::Exhausted { .. } => self.terminate_locked(id)?,
            };

            Ok(TickResult {
                outcome: report.outcome,
                status,
            })
        })
    }

    /// Stop an exhausted session per policy, then drop its participants
    fn terminate_locked(&self, id: &SessionId) -> CoreResult<SessionStatus> {
        let status = match self.policy.on_exhausted {
            ExhaustionPolicy::End => {
                let session = self.load(id)?;
                self.finish_locked(session, None, SessionEndReason::BalanceExhausted)?
                    .session
                    .status
            }
            ExhaustionPolicy::Pause => self.pause_locked(id, true)?.status,
        };

        warn!(
            session_id = %id,
            policy = self.policy.on_exhausted.as_str(),
            "Forcing participants out after balance exhaustion"
        );
        self.events.emit(CoreEvent::ForceLeave {
            session_id: id.clone(),
            reason: SessionEndReason::BalanceExhausted,
        });
        Ok(status)
    }

    pub fn sessions_for_client(
        &self,
        client: &ActorId,
        status: Option<SessionStatus>,
    ) -> CoreResult<Vec<Session>> {
        let mut query = SessionQuery::for_client(client.clone());
        if let Some(status) = status {
            query = query.with_status(status);
        }
        Ok(self.store.list_sessions(&query)?)
    }

    pub fn sessions_for_advisor(
        &self,
        advisor: &ActorId,
        status: Option<SessionStatus>,
    ) -> CoreResult<Vec<Session>> {
        let mut query = SessionQuery::for_advisor(advisor.clone());
        if let Some(status) = status {
            query = query.with_status(status);
        }
        Ok(self.store.list_sessions(&query)?)
    }

    /// Sessions that should currently be billed
    pub fn active_sessions(&self) -> CoreResult<Vec<Session>> {
        let query = SessionQuery::default().with_status(SessionStatus::Active);
        Ok(self.store.list_sessions(&query)?)
    }

    /// The live (active or paused) session between a client and an advisor
    pub fn warnings(&self, id: &SessionId) -> CoreResult<Vec<BalanceWarning>> {
        Ok(self.store.get_warnings(id)?)
    }

    pub fn advisor_rating(&self, advisor: &ActorId) -> CoreResult<AdvisorRating> {
        Ok(self.store.get_advisor_rating(advisor)?)
    }
}
