//! Session lifecycle and billing routes

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use meter_api::{
    AdvisorRating, BalanceWarning, CancelSessionRequest, CreateSessionRequest, Earning,
    EndSessionRequest, RateSessionRequest, Role, Session, SessionStatus, TickResponse,
    WarningKind,
};
use meter_core::{TickOutcome, TickResult};
use meter_util::SessionId;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthActor, RequireAdmin, authorize_participant};
use crate::error::{AppError, AppResult};
use crate::routes::optional_body;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/tick", post(tick_session))
        .route("/sessions/{id}/pause", post(pause_session))
        .route("/sessions/{id}/resume", post(resume_session))
        .route("/sessions/{id}/end", post(end_session))
        .route("/sessions/{id}/cancel", post(cancel_session))
        .route("/sessions/{id}/rating", post(rate_session))
        .route("/sessions/{id}/warnings", get(session_warnings))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<SessionStatus>,
}

/// A completed session with its earning
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementBody {
    pub session: Session,
    pub earning: Earning,
}

/// Map a tick to its wire shape
pub fn tick_response(result: TickResult) -> TickResponse {
    match result.outcome {
        TickOutcome::Charged {
            charged,
            new_balance,
            warning,
        } => TickResponse::Charged {
            charged,
            new_balance,
            warning,
        },
        TickOutcome::Exhausted { balance } => TickResponse::Exhausted {
            should_pause: true,
            balance,
            warning: WarningKind::ZeroBalance,
            status: result.status,
        },
        TickOutcome::Skipped { status } => TickResponse::Skipped {
            skipped: true,
            status,
        },
    }
}

async fn create_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Json(req): Json<CreateSessionRequest>,
) -> AppResult<Json<Session>> {
    let allowed = actor.role.can_administer()
        || (actor.role.can_start_session() && actor.id == req.client_id);
    if !allowed {
        return Err(AppError::forbidden("Only the client may start their session"));
    }

    let session = state
        .blocking(move |s| {
            Ok(s.manager
                .create(&req.client_id, &req.advisor_id, req.channel, req.rate_per_minute)?)
        })
        .await?;
    Ok(Json(session))
}

async fn list_sessions(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<Session>>> {
    let sessions = state
        .blocking(move |s| {
            let sessions = match actor.role {
                Role::Client => s.manager.sessions_for_client(&actor.id, query.status)?,
                Role::Advisor => s.manager.sessions_for_advisor(&actor.id, query.status)?,
                Role::Admin => s.manager.active_sessions()?,
            };
            Ok(sessions)
        })
        .await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<SessionId>,
) -> AppResult<Json<Session>> {
    let session = state
        .blocking(move |s| {
            let session = s.manager.get(&id)?;
            authorize_participant(&actor, &session)?;
            Ok(session)
        })
        .await?;
    Ok(Json(session))
}

async fn tick_session(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<SessionId>,
) -> AppResult<Json<TickResponse>> {
    let result = state
        .blocking(move |s| Ok(s.manager.tick(&id)?))
        .await?;
    Ok(Json(tick_response(result)))
}

async fn pause_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<SessionId>,
) -> AppResult<Json<Session>> {
    let session = state
        .blocking(move |s| {
            authorize_participant(&actor, &s.manager.get(&id)?)?;
            Ok(s.manager.pause(&id)?)
        })
        .await?;
    Ok(Json(session))
}

async fn resume_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<SessionId>,
) -> AppResult<Json<Session>> {
    let session = state
        .blocking(move |s| {
            authorize_participant(&actor, &s.manager.get(&id)?)?;
            Ok(s.manager.resume(&id)?)
        })
        .await?;
    Ok(Json(session))
}

async fn end_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<SessionId>,
    body: Bytes,
) -> AppResult<Json<SettlementBody>> {
    let req: EndSessionRequest = optional_body(&body)?;
    let settlement = state
        .blocking(move |s| {
            let session = s.manager.get(&id)?;
            authorize_participant(&actor, &session)?;
            Ok(s.manager.end(&id, req.totals(session.totals()))?)
        })
        .await?;

    Ok(Json(SettlementBody {
        session: settlement.session,
        earning: settlement.earning,
    }))
}

async fn cancel_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<SessionId>,
    body: Bytes,
) -> AppResult<Json<Session>> {
    let req: CancelSessionRequest = optional_body(&body)?;
    let session = state
        .blocking(move |s| {
            authorize_participant(&actor, &s.manager.get(&id)?)?;
            Ok(s.manager.cancel(&id, req.reason)?)
        })
        .await?;
    Ok(Json(session))
}

async fn rate_session(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<SessionId>,
    Json(req): Json<RateSessionRequest>,
) -> AppResult<Json<AdvisorRating>> {
    let rating = state
        .blocking(move |s| {
            let session = s.manager.get(&id)?;
            if !actor.role.can_administer() && actor.id != session.client_id {
                return Err(AppError::forbidden("Only the client may rate a session"));
            }
            Ok(s.manager.rate(&id, req.stars, req.feedback)?)
        })
        .await?;
    Ok(Json(rating))
}

async fn session_warnings(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(id): Path<SessionId>,
) -> AppResult<Json<Vec<BalanceWarning>>> {
    let warnings = state
        .blocking(move |s| {
            authorize_participant(&actor, &s.manager.get(&id)?)?;
            Ok(s.manager.warnings(&id)?)
        })
        .await?;
    Ok(Json(warnings))
}
