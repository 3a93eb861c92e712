//! Shared handler state

use meter_config::BillingPolicy;
use meter_core::{EarningsBook, EventSink, Ledger, SessionManager};
use meter_host_api::CallHost;
use meter_store::Store;
use std::sync::Arc;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub earnings: EarningsBook,
    pub store: Arc<dyn Store>,
    pub host: Arc<dyn CallHost>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        policy: BillingPolicy,
        events: Arc<dyn EventSink>,
        host: Arc<dyn CallHost>,
    ) -> Self {
        let earnings = EarningsBook::new(store.clone(), policy.currency.clone());
        let manager = Arc::new(SessionManager::new(store.clone(), policy, events));
        Self {
            manager,
            earnings,
            store,
            host,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        self.manager.ledger()
    }

    /// Run synchronous store work on the blocking pool
    pub async fn blocking<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&AppState) -> AppResult<T> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| AppError::Internal(format!("Blocking task failed: {}", e)))?
    }
}
