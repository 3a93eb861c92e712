//! Per-session tick scheduler
//!
//! Each active session gets one task that fires every interval, starting one
//! interval after the session starts or resumes. The tick itself runs on the
//! blocking pool since the store is synchronous. A tick is always awaited
//! before the next one, so same-session ticks never overlap.

use meter_api::SessionStatus;
use meter_core::{CoreResult, SessionManager};
use meter_util::SessionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

struct Task {
    generation: u64,
    handle: JoinHandle<()>,
}

type TaskMap = Arc<Mutex<HashMap<SessionId, Task>>>;

pub struct TickScheduler {
    manager: Arc<SessionManager>,
    period: Duration,
    tasks: TaskMap,
    next_generation: AtomicU64,
}

impl TickScheduler {
    pub fn new(manager: Arc<SessionManager>, period: Duration) -> Self {
        Self {
            manager,
            period,
            tasks: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start (or restart) billing for a session
    pub fn start(&self, session_id: SessionId) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(run_session(
            self.manager.clone(),
            self.tasks.clone(),
            session_id.clone(),
            self.period,
            generation,
        ));

        let previous = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session_id.clone(), Task { generation, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
        }

        debug!(session_id = %session_id, period_secs = self.period.as_secs_f64(), "Tick task started");
    }

    /// Stop billing for a session. A tick already on the blocking pool
    /// still completes.
    pub fn stop(&self, session_id: &SessionId) {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(session_id);
        if let Some(task) = task {
            task.handle.abort();
            debug!(session_id = %session_id, "Tick task stopped");
        }
    }

    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(session_id)
    }

    pub fn running(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Start tasks for every session left active by a previous run
    pub fn restore(&self) -> CoreResult<usize> {
        let sessions = self.manager.active_sessions()?;
        for session in &sessions {
            self.start(session.id.clone());
        }
        if !sessions.is_empty() {
            info!(count = sessions.len(), "Resumed billing for active sessions");
        }
        Ok(sessions.len())
    }

    pub fn shutdown(&self) {
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();
        for (_, task) in &tasks {
            task.handle.abort();
        }
        info!(count = tasks.len(), "Tick scheduler stopped");
    }
}

async fn run_session(
    manager: Arc<SessionManager>,
    tasks: TaskMap,
    session_id: SessionId,
    period: Duration,
    generation: u64,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let tick_manager = manager.clone();
        let id = session_id.clone();
        match tokio::task::spawn_blocking(move || tick_manager.tick(&id)).await {
            Ok(Ok(result)) => {
                if result.status != SessionStatus::Active {
                    debug!(session_id = %session_id, status = %result.status, "Billing stopped");
                    break;
                }
            }
            Ok(Err(e)) if e.is_transient() => {
                warn!(session_id = %session_id, error = %e, "Tick failed, retrying next interval");
            }
            Ok(Err(e)) => {
                warn!(session_id = %session_id, error = %e, "Tick rejected, stopping billing");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Tick task panicked");
                break;
            }
        }
    }

    // Only remove our own entry; a restart may have replaced it
    let mut tasks = tasks.lock().unwrap_or_else(|e| e.into_inner());
    if tasks.get(&session_id).map(|t| t.generation) == Some(generation) {
        tasks.remove(&session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_api::ChannelKind;
    use meter_config::BillingPolicy;
    use meter_core::NullSink;
    use meter_store::{SqliteStore, Store};
    use meter_util::ActorId;
    use rust_decimal_macros::dec;

    fn manager() -> Arc<SessionManager> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        Arc::new(SessionManager::new(store, BillingPolicy::default(), Arc::new(NullSink)))
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn bills_until_exhausted() {
        let manager = manager();
        let client = ActorId::new("client");
        manager.ledger().credit(&client, dec!(3), None).unwrap();
        let session = manager
            .create(&client, &ActorId::new("advisor"), ChannelKind::Chat, dec!(1))
            .unwrap();

        let scheduler = TickScheduler::new(manager.clone(), Duration::from_millis(10));
        scheduler.start(session.id.clone());
        assert!(scheduler.is_running(&session.id));

        let id = session.id.clone();
        let m = manager.clone();
        wait_until(move || m.get(&id).unwrap().status == SessionStatus::Completed).await;

        let stored = manager.get(&session.id).unwrap();
        assert_eq!(stored.total_charged, dec!(3));
        assert_eq!(manager.ledger().balance(&client).unwrap(), dec!(0));

        wait_until(|| !scheduler.is_running(&session.id)).await;
    }

    #[tokio::test]
    async fn stop_halts_billing() {
        let manager = manager();
        let client = ActorId::new("client");
        manager.ledger().credit(&client, dec!(100), None).unwrap();
        let session = manager
            .create(&client, &ActorId::new("advisor"), ChannelKind::Video, dec!(1))
            .unwrap();

        let scheduler = TickScheduler::new(manager.clone(), Duration::from_secs(3600));
        scheduler.start(session.id.clone());
        scheduler.stop(&session.id);
        assert!(!scheduler.is_running(&session.id));
        assert_eq!(scheduler.running(), 0);

        let stored = manager.get(&session.id).unwrap();
        assert_eq!(stored.total_charged, dec!(0));
    }

    #[tokio::test]
    async fn restore_starts_active_sessions() {
        let manager = manager();
        let client = ActorId::new("client");
        manager.ledger().credit(&client, dec!(10), None).unwrap();
        let advisor = ActorId::new("advisor");
        let live = manager
            .create(&client, &advisor, ChannelKind::Chat, dec!(1))
            .unwrap();
        let paused = manager
            .create(&client, &ActorId::new("other"), ChannelKind::Chat, dec!(1))
            .unwrap();
        manager.pause(&paused.id).unwrap();

        let scheduler = TickScheduler::new(manager, Duration::from_secs(3600));
        assert_eq!(scheduler.restore().unwrap(), 1);
        assert!(scheduler.is_running(&live.id));
        assert!(!scheduler.is_running(&paused.id));

        scheduler.shutdown();
        assert_eq!(scheduler.running(), 0);
    }
}
