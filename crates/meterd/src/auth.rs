//! Actor extraction
//!
//! Identity is verified upstream; requests arrive with the caller in the
//! `x-actor-id` and `x-actor-role` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use meter_api::{Actor, Role, Session};
use meter_util::ActorId;

use crate::error::AppError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct AuthActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", name)))
}

impl<S: Send + Sync> FromRequestParts<S> for AuthActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = ActorId::parse(header(parts, ACTOR_ID_HEADER)?)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        let role: Role = header(parts, ACTOR_ROLE_HEADER)?
            .parse()
            .map_err(|e: meter_util::MeterError| AppError::Unauthorized(e.to_string()))?;

        Ok(AuthActor(Actor { id, role }))
    }
}

/// Requires the admin role. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthActor(actor) = AuthActor::from_request_parts(parts, state).await?;
        if !actor.role.can_administer() {
            return Err(AppError::forbidden("Admin role required"));
        }
        Ok(RequireAdmin(actor))
    }
}

/// Participants and admins may act on a session
pub fn authorize_participant(actor: &Actor, session: &Session) -> Result<(), AppError> {
    if actor.role.can_administer() || session.involves(&actor.id) {
        Ok(())
    } else {
        Err(AppError::forbidden("Not a participant of this session"))
    }
}

/// The owner and admins may act on an actor's resources
pub fn authorize_owner(actor: &Actor, owner: &ActorId) -> Result<(), AppError> {
    if actor.can_act_for(owner) {
        Ok(())
    } else {
        Err(AppError::forbidden("Cannot act for another actor"))
    }
}
