//! Mock call host for testing

use async_trait::async_trait;
use meter_api::{SessionEndReason, WarningKind};
use meter_util::{ActorId, SessionId};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::{CallHost, HostError, HostEvent, HostResult, RoomRequest};

/// One recorded host call
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    SessionStarted(RoomRequest),
    Warning {
        session_id: SessionId,
        client: ActorId,
        kind: WarningKind,
        balance: Decimal,
    },
    ForceLeave {
        session_id: SessionId,
        reason: SessionEndReason,
    },
}

/// Records every call; can be told to fail
pub struct MockHost {
    calls: Arc<Mutex<Vec<HostCall>>>,
    event_tx: mpsc::UnboundedSender<HostEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>,

    /// Configure every call to fail
    pub fail: Arc<Mutex<bool>>,
}

impl MockHost {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Simulate a participant dropping out of a room
    pub fn simulate_leave(&self, session_id: &SessionId, actor: &ActorId) {
        let _ = self.event_tx.send(HostEvent::ParticipantLeft {
            session_id: session_id.clone(),
            actor: actor.clone(),
        });
    }

    fn record(&self, call: HostCall) -> HostResult<()> {
        if *self.fail.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(HostError::Unavailable("Mock host failure".into()));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        Ok(())
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallHost for MockHost {
    async fn session_started(&self, room: &RoomRequest) -> HostResult<()> {
        self.record(HostCall::SessionStarted(room.clone()))
    }

    async fn notify_warning(
        &self,
        session_id: &SessionId,
        client: &ActorId,
        kind: WarningKind,
        balance: Decimal,
    ) -> HostResult<()> {
        self.record(HostCall::Warning {
            session_id: session_id.clone(),
            client: client.clone(),
            kind,
            balance,
        })
    }

    async fn force_leave(&self, session_id: &SessionId, reason: &SessionEndReason) -> HostResult<()> {
        self.record(HostCall::ForceLeave {
            session_id: session_id.clone(),
            reason: reason.clone(),
        })
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<HostEvent>> {
        self.event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn is_healthy(&self) -> bool {
        !*self.fail.lock().unwrap_or_else(|e| e.into_inner())
    }
}
