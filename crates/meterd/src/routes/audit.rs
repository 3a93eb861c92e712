//! Audit log access for operators

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::routing::get;
use meter_api::HistoryQuery;
use meter_core::CoreError;
use meter_store::AuditEvent;

use crate::auth::RequireAdmin;
use crate::error::AppResult;
use crate::state::AppState;

const DEFAULT_AUDIT_PAGE: u32 = 50;
const MAX_AUDIT_PAGE: u32 = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/audit", get(recent_audits))
}

async fn recent_audits(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<AuditEvent>>> {
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_PAGE).min(MAX_AUDIT_PAGE) as usize;
    let events = state
        .blocking(move |s| Ok(s.store.get_recent_audits(limit).map_err(CoreError::from)?))
        .await?;
    Ok(Json(events))
}
