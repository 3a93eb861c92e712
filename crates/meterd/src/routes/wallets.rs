//! Wallet routes

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use meter_api::{BalanceResponse, CreditRequest, DebitRequest, HistoryQuery, RefundRequest, Transaction};
use meter_core::{CoreError, DebitOutcome};
use meter_util::ActorId;
use rust_decimal::Decimal;

use crate::auth::{AuthActor, RequireAdmin, authorize_owner};
use crate::error::AppResult;
use crate::state::AppState;

/// Cap on a single history page
const MAX_HISTORY: u32 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/wallets/{owner}", get(get_wallet))
        .route("/wallets/{owner}/transactions", get(get_transactions))
        .route("/wallets/{owner}/credit", post(credit_wallet))
        .route("/wallets/{owner}/debit", post(debit_wallet))
        .route("/wallets/{owner}/refund", post(refund_wallet))
}

fn balance_response(state: &AppState, owner: ActorId, balance: Decimal) -> BalanceResponse {
    BalanceResponse {
        owner,
        balance,
        currency: state.ledger().currency().to_string(),
    }
}

async fn get_wallet(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(owner): Path<ActorId>,
) -> AppResult<Json<BalanceResponse>> {
    authorize_owner(&actor, &owner)?;
    let response = state
        .blocking(move |s| {
            let balance = s.ledger().balance(&owner)?;
            Ok(balance_response(s, owner, balance))
        })
        .await?;
    Ok(Json(response))
}

async fn get_transactions(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(owner): Path<ActorId>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Transaction>>> {
    authorize_owner(&actor, &owner)?;
    let limit = query.limit.map(|l| l.min(MAX_HISTORY));
    let history = state
        .blocking(move |s| Ok(s.ledger().transactions(&owner, limit)?))
        .await?;
    Ok(Json(history))
}

async fn credit_wallet(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(owner): Path<ActorId>,
    Json(req): Json<CreditRequest>,
) -> AppResult<Json<BalanceResponse>> {
    authorize_owner(&actor, &owner)?;
    let response = state
        .blocking(move |s| {
            let balance = s.ledger().credit(&owner, req.amount, req.description)?;
            Ok(balance_response(s, owner, balance))
        })
        .await?;
    Ok(Json(response))
}

async fn debit_wallet(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(owner): Path<ActorId>,
    Json(req): Json<DebitRequest>,
) -> AppResult<Json<BalanceResponse>> {
    let response = state
        .blocking(move |s| {
            match s
                .ledger()
                .debit(&owner, req.amount, req.session_id, req.description)?
            {
                DebitOutcome::Applied { new_balance } => Ok(balance_response(s, owner, new_balance)),
                DebitOutcome::Insufficient { balance } => Err(CoreError::InsufficientBalance {
                    required: req.amount,
                    available: balance,
                }
                .into()),
            }
        })
        .await?;
    Ok(Json(response))
}

async fn refund_wallet(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(owner): Path<ActorId>,
    Json(req): Json<RefundRequest>,
) -> AppResult<Json<BalanceResponse>> {
    let response = state
        .blocking(move |s| {
            let balance = s.ledger().refund(&owner, req.amount, &req.reason)?;
            Ok(balance_response(s, owner, balance))
        })
        .await?;
    Ok(Json(response))
}
