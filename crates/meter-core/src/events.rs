//! Core events emitted by the session manager

use meter_api::{Session, SessionEndReason, WarningKind};
use meter_util::{ActorId, SessionId};
use rust_decimal::Decimal;
use std::sync::Mutex;

/// Events emitted by the core
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Session created and billing should start
    SessionStarted { session: Session },

    /// Billing stopped until resume
    SessionPaused {
        session_id: SessionId,
        /// Paused by the exhaustion policy rather than a participant
        exhausted: bool,
    },

    /// Billing should restart
    SessionResumed { session_id: SessionId },

    /// One tick was charged
    Charged {
        session_id: SessionId,
        charged: Decimal,
        new_balance: Decimal,
    },

    /// Low-balance warning, issued once per kind per session
    Warning {
        session_id: SessionId,
        client_id: ActorId,
        kind: WarningKind,
        balance: Decimal,
    },

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

    /// Participants must be dropped from the call
    ForceLeave {
        session_id: SessionId,
        reason: SessionEndReason,
    },
}

impl CoreEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            CoreEvent::SessionStarted { session } => &session.id,
            CoreEvent::SessionPaused { session_id, .. }
            | CoreEvent::SessionResumed { session_id }
            | CoreEvent::Charged { session_id, .. }
            | CoreEvent::Warning { session_id, .. }
            | CoreEvent::SessionEnded { session_id, .. }
            | CoreEvent::SessionCancelled { session_id, .. }
            | CoreEvent::ForceLeave { session_id, .. } => session_id,
        }
    }

    /// Whether billing for the session must stop
    pub fn stops_billing(&self) -> bool {
        matches!(
            self,
            CoreEvent::SessionPaused { .. }
                | CoreEvent::SessionEnded { .. }
                | CoreEvent::SessionCancelled { .. }
        )
    }
}

/// Receiver for core events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CoreEvent);
}

/// Discards every event
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: CoreEvent) {}
}

/// Keeps events in memory, in emission order
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<CoreEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything collected so far
    pub fn drain(&self) -> Vec<CoreEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: CoreEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
