//! Host that only logs
//!
//! Used when no realtime provider is wired in.

use async_trait::async_trait;
use meter_api::{SessionEndReason, WarningKind};
use meter_util::{ActorId, SessionId};
use rust_decimal::Decimal;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::info;

use crate::{CallHost, HostEvent, HostResult, RoomRequest};

pub struct LoggingHost {
    // Held so the receiver stays open
    _event_tx: mpsc::UnboundedSender<HostEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>,
}

impl LoggingHost {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            _event_tx: tx,
            event_rx: Mutex::new(Some(rx)),
        }
    }
}

impl Default for LoggingHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallHost for LoggingHost {
    async fn session_started(&self, room: &RoomRequest) -> HostResult<()> {
        info!(
            session_id = %room.session_id,
            client_id = %room.client_id,
            advisor_id = %room.advisor_id,
            channel = room.channel.as_str(),
            "Room opened"
        );
        Ok(())
    }

    async fn notify_warning(
        &self,
        session_id: &SessionId,
        client: &ActorId,
        kind: WarningKind,
        balance: Decimal,
    ) -> HostResult<()> {
        info!(
            session_id = %session_id,
            client_id = %client,
            kind = kind.as_str(),
            balance = %balance,
            "Balance warning sent"
        );
        Ok(())
    }

    async fn force_leave(&self, session_id: &SessionId, reason: &SessionEndReason) -> HostResult<()> {
        info!(session_id = %session_id, reason = ?reason, "Participants removed");
        Ok(())
    }

    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<HostEvent>> {
        self.event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}
