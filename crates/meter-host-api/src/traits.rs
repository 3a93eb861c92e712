//! Call host trait

use async_trait::async_trait;
use meter_api::{ChannelKind, Session, SessionEndReason, WarningKind};
use meter_util::{ActorId, SessionId};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from the realtime provider
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Room not found for session {0}")]
    RoomNotFound(SessionId),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// What the realtime provider needs to open a room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRequest {
    pub session_id: SessionId,
    pub client_id: ActorId,
    pub advisor_id: ActorId,
    pub channel: ChannelKind,
}

impl From<&Session> for RoomRequest {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            client_id: session.client_id.clone(),
            advisor_id: session.advisor_id.clone(),
            channel: session.channel,
        }
    }
}

/// Events reported by the realtime provider
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A participant disconnected from the room
    ParticipantLeft {
        session_id: SessionId,
        actor: ActorId,
    },
}

/// Realtime chat/video provider
///
/// Billing state is authoritative locally; a failed host call is logged by
/// the caller and never rolls back a transition.
#[async_trait]
pub trait CallHost: Send + Sync {
    /// Open the room for a freshly started session
    async fn session_started(&self, room: &RoomRequest) -> HostResult<()>;

    /// Surface a low-balance warning to the client
    async fn notify_warning(
        &self,
        session_id: &SessionId,
        client: &ActorId,
        kind: WarningKind,
        balance: Decimal,
    ) -> HostResult<()>;

    /// Remove every participant from the session's room
    async fn force_leave(&self, session_id: &SessionId, reason: &SessionEndReason) -> HostResult<()>;

    /// Take the event stream. Returns None after the first call.
    fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<HostEvent>>;

    fn is_healthy(&self) -> bool {
        true
    }
}
