//! Advisor earnings and rating routes

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use meter_api::{
    AdvisorRating, Earning, EarningStatus, EarningsSummary, WithdrawRequest, WithdrawResponse,
};
use meter_util::ActorId;
use serde::{Deserialize, Serialize};

use crate::auth::{AuthActor, RequireAdmin, authorize_owner};
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/advisors/{id}/earnings", get(get_earnings))
        .route("/advisors/{id}/earnings/withdraw", post(withdraw_earnings))
        .route("/advisors/{id}/rating", get(get_rating))
}

#[derive(Debug, Default, Deserialize)]
pub struct EarningsQuery {
    #[serde(default)]
    pub status: Option<EarningStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsBody {
    pub summary: EarningsSummary,
    pub earnings: Vec<Earning>,
}

async fn get_earnings(
    State(state): State<AppState>,
    AuthActor(actor): AuthActor,
    Path(advisor): Path<ActorId>,
    Query(query): Query<EarningsQuery>,
) -> AppResult<Json<EarningsBody>> {
    authorize_owner(&actor, &advisor)?;
    let body = state
        .blocking(move |s| {
            Ok(EarningsBody {
                summary: s.earnings.summary(&advisor)?,
                earnings: s.earnings.for_advisor(&advisor, query.status)?,
            })
        })
        .await?;
    Ok(Json(body))
}

async fn withdraw_earnings(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(advisor): Path<ActorId>,
    Json(req): Json<WithdrawRequest>,
) -> AppResult<Json<WithdrawResponse>> {
    let response = state
        .blocking(move |s| {
            let withdrawal = s.earnings.withdraw(&advisor, &req.earning_ids)?;
            let new_balance = match &withdrawal.transaction {
                Some(tx) => tx.balance_after,
                None => s.ledger().balance(&advisor)?,
            };
            Ok(WithdrawResponse {
                withdrawn: withdrawal.earnings.into_iter().map(|e| e.id).collect(),
                amount: withdrawal.amount,
                new_balance,
            })
        })
        .await?;
    Ok(Json(response))
}

async fn get_rating(
    State(state): State<AppState>,
    AuthActor(_actor): AuthActor,
    Path(advisor): Path<ActorId>,
) -> AppResult<Json<AdvisorRating>> {
    let rating = state
        .blocking(move |s| Ok(s.manager.advisor_rating(&advisor)?))
        .await?;
    Ok(Json(rating))
}
