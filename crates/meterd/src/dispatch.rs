//! Core and host event dispatch
//!
//! The session manager emits [`CoreEvent`]s synchronously from whichever
//! thread ran the operation; [`ChannelSink`] forwards them to the service
//! loop, which hands each one to [`Dispatcher`].

use meter_core::{CoreError, CoreEvent, EventSink, SessionManager};
use meter_host_api::{CallHost, HostEvent, RoomRequest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::scheduler::TickScheduler;

/// Forwards core events onto an unbounded channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CoreEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: CoreEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

/// Applies core events to the scheduler and the call host
pub struct Dispatcher {
    manager: Arc<SessionManager>,
    scheduler: Arc<TickScheduler>,
    host: Arc<dyn CallHost>,
}

impl Dispatcher {
    pub fn new(
        manager: Arc<SessionManager>,
        scheduler: Arc<TickScheduler>,
        host: Arc<dyn CallHost>,
    ) -> Self {
        Self {
            manager,
            scheduler,
            host,
        }
    }

    pub async fn handle_core_event(&self, event: CoreEvent) {
        if event.stops_billing() {
            self.scheduler.stop(event.session_id());
        }

        match &event {
            CoreEvent::SessionStarted { session } => {
                self.scheduler.start(session.id.clone());
                if let Err(e) = self.host.session_started(&RoomRequest::from(session)).await {
                    warn!(session_id = %session.id, error = %e, "Failed to open room");
                }
            }

            CoreEvent::SessionResumed { session_id } => {
                self.scheduler.start(session_id.clone());
            }

            CoreEvent::Warning {
                session_id,
                client_id,
                kind,
                balance,
            } => {
                if let Err(e) = self
                    .host
                    .notify_warning(session_id, client_id, *kind, *balance)
                    .await
                {
                    warn!(session_id = %session_id, error = %e, "Failed to deliver warning");
                }
            }

            CoreEvent::ForceLeave { session_id, reason } => {
                // Local state is already final; the host call is best effort
                if let Err(e) = self.host.force_leave(session_id, reason).await {
                    warn!(session_id = %session_id, error = %e, "Failed to remove participants");
                }
            }

            CoreEvent::Charged {
                session_id,
                charged,
                new_balance,
            } => {
                debug!(
                    session_id = %session_id,
                    charged = %charged,
                    balance = %new_balance,
                    "Charged"
                );
            }

            CoreEvent::SessionPaused { .. }
            | CoreEvent::SessionEnded { .. }
            | CoreEvent::SessionCancelled { .. } => {}
        }
    }

    pub async fn handle_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::ParticipantLeft { session_id, actor } => {
                info!(
                    session_id = %session_id,
                    actor = %actor,
                    "Participant left - ending session"
                );

                let manager = self.manager.clone();
                let id = session_id.clone();
                let result = tokio::task::spawn_blocking(move || manager.end(&id, None)).await;

                match result {
                    Ok(Ok(settlement)) => {
                        debug!(
                            session_id = %session_id,
                            status = %settlement.session.status,
                            "Session settled after participant left"
                        );
                    }
                    // Already cancelled, or never existed
                    Ok(Err(e @ (CoreError::InvalidTransition { .. } | CoreError::SessionNotFound(_)))) => {
                        debug!(session_id = %session_id, error = %e, "Nothing to end");
                    }
                    Ok(Err(e)) => {
                        warn!(session_id = %session_id, error = %e, "Failed to end session");
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "End task failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_api::{ChannelKind, SessionEndReason, SessionStatus};
    use meter_config::BillingPolicy;
    use meter_host_api::{HostCall, MockHost};
    use meter_store::{SqliteStore, Store};
    use meter_util::ActorId;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        manager: Arc<SessionManager>,
        scheduler: Arc<TickScheduler>,
        host: Arc<MockHost>,
        dispatcher: Dispatcher,
        events: mpsc::UnboundedReceiver<CoreEvent>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        let (sink, events) = ChannelSink::new();
        let manager = Arc::new(SessionManager::new(store, BillingPolicy::default(), Arc::new(sink)));
        let scheduler = Arc::new(TickScheduler::new(manager.clone(), Duration::from_secs(3600)));
        let host = Arc::new(MockHost::new());
        let dispatcher = Dispatcher::new(manager.clone(), scheduler.clone(), host.clone());
        Fixture {
            manager,
            scheduler,
            host,
            dispatcher,
            events,
        }
    }

    impl Fixture {
        async fn drain(&mut self) {
            while let Ok(event) = self.events.try_recv() {
                self.dispatcher.handle_core_event(event).await;
            }
        }
    }

    #[tokio::test]
    async fn start_and_end_drive_scheduler_and_host() {
        let mut f = fixture();
        let client = ActorId::new("client");
        f.manager.ledger().credit(&client, dec!(5), None).unwrap();
        let session = f
            .manager
            .create(&client, &ActorId::new("advisor"), ChannelKind::Chat, dec!(1))
            .unwrap();

        f.drain().await;
        assert!(f.scheduler.is_running(&session.id));
        assert!(matches!(f.host.calls().as_slice(), [HostCall::SessionStarted(_)]));

        f.manager.pause(&session.id).unwrap();
        f.drain().await;
        assert!(!f.scheduler.is_running(&session.id));

        f.manager.resume(&session.id).unwrap();
        f.drain().await;
        assert!(f.scheduler.is_running(&session.id));

        f.manager.end(&session.id, None).unwrap();
        f.drain().await;
        assert!(!f.scheduler.is_running(&session.id));
    }

    #[tokio::test]
    async fn exhaustion_forces_leave_and_warns() {
        let mut f = fixture();
        let client = ActorId::new("client");
        f.manager.ledger().credit(&client, dec!(1), None).unwrap();
        let session = f
            .manager
            .create(&client, &ActorId::new("advisor"), ChannelKind::Video, dec!(1))
            .unwrap();

        f.manager.tick(&session.id).unwrap();
        f.manager.tick(&session.id).unwrap();
        f.drain().await;

        let calls = f.host.calls();
        assert!(calls.iter().any(|c| matches!(c, HostCall::Warning { .. })));
        assert!(matches!(
            calls.last(),
            Some(HostCall::ForceLeave { reason: SessionEndReason::BalanceExhausted, .. })
        ));
        assert!(!f.scheduler.is_running(&session.id));
    }

    #[tokio::test]
    async fn host_failure_keeps_local_state() {
        let mut f = fixture();
        f.host.set_failing(true);
        let client = ActorId::new("client");
        f.manager.ledger().credit(&client, dec!(1), None).unwrap();
        let session = f
            .manager
            .create(&client, &ActorId::new("advisor"), ChannelKind::Chat, dec!(1))
            .unwrap();

        f.manager.tick(&session.id).unwrap();
        f.manager.tick(&session.id).unwrap();
        f.drain().await;

        assert_eq!(
            f.manager.get(&session.id).unwrap().status,
            SessionStatus::Completed
        );
    }

    #[tokio::test]
    async fn participant_leaving_ends_session() {
        let f = fixture();
        let client = ActorId::new("client");
        f.manager.ledger().credit(&client, dec!(5), None).unwrap();
        let session = f
            .manager
            .create(&client, &ActorId::new("advisor"), ChannelKind::Chat, dec!(1))
            .unwrap();

        f.dispatcher
            .handle_host_event(HostEvent::ParticipantLeft {
                session_id: session.id.clone(),
                actor: client.clone(),
            })
            .await;
        assert_eq!(
            f.manager.get(&session.id).unwrap().status,
            SessionStatus::Completed
        );

        // A second leave is harmless
        f.dispatcher
            .handle_host_event(HostEvent::ParticipantLeft {
                session_id: session.id.clone(),
                actor: ActorId::new("advisor"),
            })
            .await;
    }
}
