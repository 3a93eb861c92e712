//! Row mapping between SQLite and domain records
//!
//! Amounts, identifiers and timestamps are stored as text.

use chrono::{DateTime, Utc};
use meter_api::{BalanceWarning, Earning, Rating, Session, SessionEndReason, Transaction, Wallet};
use meter_util::ActorId;
use rusqlite::Row;
use rusqlite::types::Type;
use std::str::FromStr;

pub const WALLET_COLUMNS: &str = "owner, balance, currency, created_at, updated_at";

pub const TRANSACTION_COLUMNS: &str =
    "id, owner, kind, amount, balance_after, session_id, description, created_at";

pub const SESSION_COLUMNS: &str = "id, client_id, advisor_id, channel, rate_per_minute, status, \
     start_time, end_time, paused_at, total_duration_seconds, total_charged, \
     client_wallet_before, client_wallet_after, advisor_earning, last_activity_time, \
     rating, feedback, end_reason";

pub const EARNING_COLUMNS: &str = "id, advisor_id, session_id, client_id, channel, amount, \
     platform_fee, duration_seconds, status, created_at, withdrawn_at";

pub const WARNING_COLUMNS: &str = "session_id, owner, kind, balance, created_at";

pub const RATING_COLUMNS: &str = "session_id, client_id, advisor_id, stars, feedback, created_at";

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Read a text column and parse it
pub fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

pub fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| t.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn actor_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<ActorId> {
    Ok(ActorId::new(row.get::<_, String>(idx)?))
}

fn u64_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

pub fn time_text(at: &DateTime<Utc>) -> String {
    at.to_rfc3339()
}

pub fn wallet_from_row(row: &Row<'_>) -> rusqlite::Result<Wallet> {
    Ok(Wallet {
        owner: actor_col(row, 0)?,
        balance: parse_col(row, 1)?,
        currency: row.get(2)?,
        created_at: parse_col(row, 3)?,
        updated_at: parse_col(row, 4)?,
    })
}

pub fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        owner: actor_col(row, 1)?,
        kind: parse_col(row, 2)?,
        amount: parse_col(row, 3)?,
        balance_after: parse_col(row, 4)?,
        session_id: parse_opt_col(row, 5)?,
        description: row.get(6)?,
        created_at: parse_col(row, 7)?,
    })
}

pub fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let end_reason: Option<String> = row.get(17)?;
    let end_reason = end_reason
        .map(|json| serde_json::from_str::<SessionEndReason>(&json))
        .transpose()
        .map_err(|e| conversion_error(17, e))?;
    let rating: Option<i64> = row.get(15)?;

    Ok(Session {
        id: parse_col(row, 0)?,
        client_id: actor_col(row, 1)?,
        advisor_id: actor_col(row, 2)?,
        channel: parse_col(row, 3)?,
        rate_per_minute: parse_col(row, 4)?,
        status: parse_col(row, 5)?,
        start_time: parse_col(row, 6)?,
        end_time: parse_opt_col(row, 7)?,
        paused_at: parse_opt_col(row, 8)?,
        total_duration_seconds: u64_col(row, 9)?,
        total_charged: parse_col(row, 10)?,
        client_wallet_before: parse_col(row, 11)?,
        client_wallet_after: parse_col(row, 12)?,
        advisor_earning: parse_opt_col(row, 13)?,
        last_activity_time: parse_col(row, 14)?,
        rating: rating.and_then(|r| u8::try_from(r).ok()),
        feedback: row.get(16)?,
        end_reason,
    })
}

pub fn earning_from_row(row: &Row<'_>) -> rusqlite::Result<Earning> {
    Ok(Earning {
        id: parse_col(row, 0)?,
        advisor_id: actor_col(row, 1)?,
        session_id: parse_col(row, 2)?,
        client_id: actor_col(row, 3)?,
        channel: parse_col(row, 4)?,
        amount: parse_col(row, 5)?,
        platform_fee: parse_col(row, 6)?,
        duration_seconds: u64_col(row, 7)?,
        status: parse_col(row, 8)?,
        created_at: parse_col(row, 9)?,
        withdrawn_at: parse_opt_col(row, 10)?,
    })
}

pub fn warning_from_row(row: &Row<'_>) -> rusqlite::Result<BalanceWarning> {
    Ok(BalanceWarning {
        session_id: parse_col(row, 0)?,
        owner: actor_col(row, 1)?,
        kind: parse_col(row, 2)?,
        balance: parse_col(row, 3)?,
        created_at: parse_col(row, 4)?,
    })
}

pub fn rating_from_row(row: &Row<'_>) -> rusqlite::Result<Rating> {
    let stars: i64 = row.get(3)?;
    Ok(Rating {
        session_id: parse_col(row, 0)?,
        client_id: actor_col(row, 1)?,
        advisor_id: actor_col(row, 2)?,
        stars: u8::try_from(stars)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?,
        feedback: row.get(4)?,
        created_at: parse_col(row, 5)?,
    })
}
