//! Liveness check

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use meter_api::{API_VERSION, HealthResponse};

use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let response = state
        .blocking(|s| {
            let store_healthy = s.store.is_healthy();
            let active_sessions = if store_healthy {
                s.manager.active_sessions()?.len()
            } else {
                0
            };
            let status = if store_healthy && s.host.is_healthy() {
                "ok"
            } else {
                "degraded"
            };

            Ok(HealthResponse {
                status: status.to_string(),
                api_version: API_VERSION,
                store_healthy,
                active_sessions,
            })
        })
        .await?;
    Ok(Json(response))
}
