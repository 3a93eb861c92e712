//! SQLite-based store implementation

use chrono::{DateTime, Utc};
use meter_api::{
    AdvisorRating, BalanceWarning, Earning, EarningStatus, Rating, Session, SessionStatus,
    Transaction, TransactionKind, Wallet,
};
use meter_util::{ActorId, EarningId, SessionId};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::rows::*;
use crate::{
    AuditEvent, DebitResult, LedgerEntry, SessionCharge, SessionQuery, Store, StoreError,
    StoreResult, Withdrawal,
};

/// SQLite-based store
///
/// All access is serialized through one connection; multi-row mutations run
/// in `BEGIN IMMEDIATE` transactions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS wallets (
                owner TEXT PRIMARY KEY,
                balance TEXT NOT NULL,
                currency TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Ledger (append-only)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount TEXT NOT NULL,
                balance_after TEXT NOT NULL,
                session_id TEXT,
                description TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                advisor_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                rate_per_minute TEXT NOT NULL,
                status TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                paused_at TEXT,
                total_duration_seconds INTEGER NOT NULL DEFAULT 0,
                total_charged TEXT NOT NULL,
                client_wallet_before TEXT NOT NULL,
                client_wallet_after TEXT NOT NULL,
                advisor_earning TEXT,
                last_activity_time TEXT NOT NULL,
                rating INTEGER,
                feedback TEXT,
                end_reason TEXT
            );

            CREATE TABLE IF NOT EXISTS earnings (
                id TEXT PRIMARY KEY,
                advisor_id TEXT NOT NULL,
                session_id TEXT NOT NULL UNIQUE,
                client_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                amount TEXT NOT NULL,
                platform_fee TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                withdrawn_at TEXT
            );

            CREATE TABLE IF NOT EXISTS balance_warnings (
                session_id TEXT NOT NULL,
                owner TEXT NOT NULL,
                kind TEXT NOT NULL,
                balance TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (session_id, kind)
            );

            CREATE TABLE IF NOT EXISTS ratings (
                session_id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                advisor_id TEXT NOT NULL,
                stars INTEGER NOT NULL CHECK (stars BETWEEN 1 AND 5),
                feedback TEXT,
                created_at TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_transactions_owner ON transactions(owner);
            CREATE INDEX IF NOT EXISTS idx_transactions_session ON transactions(session_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_client ON sessions(client_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_advisor ON sessions(advisor_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
            CREATE INDEX IF NOT EXISTS idx_earnings_advisor ON earnings(advisor_id);
            CREATE INDEX IF NOT EXISTS idx_earnings_status ON earnings(status);
            CREATE INDEX IF NOT EXISTS idx_ratings_advisor ON ratings(advisor_id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

// Helpers shared by the trait methods. They take a plain connection so they
// work both on the locked connection and inside a transaction.

fn load_wallet(conn: &Connection, owner: &ActorId) -> StoreResult<Option<Wallet>> {
    let sql = format!("SELECT {} FROM wallets WHERE owner = ?", WALLET_COLUMNS);
    Ok(conn
        .query_row(&sql, [owner.as_str()], wallet_from_row)
        .optional()?)
}

fn load_session(conn: &Connection, id: &SessionId) -> StoreResult<Option<Session>> {
    let sql = format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS);
    Ok(conn
        .query_row(&sql, [id.to_string()], session_from_row)
        .optional()?)
}

fn load_earning(conn: &Connection, id: &EarningId) -> StoreResult<Option<Earning>> {
    let sql = format!("SELECT {} FROM earnings WHERE id = ?", EARNING_COLUMNS);
    Ok(conn
        .query_row(&sql, [id.to_string()], earning_from_row)
        .optional()?)
}

/// Persist a new balance, creating the wallet if needed
fn write_balance(
    conn: &Connection,
    existing: Option<&Wallet>,
    entry: &LedgerEntry,
    balance: Decimal,
) -> StoreResult<()> {
    match existing {
        Some(wallet) => {
            let updated_at = wallet.updated_at.max(entry.at);
            conn.execute(
                "UPDATE wallets SET balance = ?, updated_at = ? WHERE owner = ?",
                params![balance.to_string(), time_text(&updated_at), entry.owner.as_str()],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO wallets (owner, balance, currency, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    entry.owner.as_str(),
                    balance.to_string(),
                    entry.currency,
                    time_text(&entry.at),
                    time_text(&entry.at),
                ],
            )?;
        }
    }
    Ok(())
}

fn append_transaction(
    conn: &Connection,
    entry: &LedgerEntry,
    balance_after: Decimal,
) -> StoreResult<Transaction> {
    conn.execute(
        "INSERT INTO transactions
             (owner, kind, amount, balance_after, session_id, description, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
            entry.owner.as_str(),
            entry.kind.as_str(),
            entry.amount.to_string(),
            balance_after.to_string(),
            entry.session_id.as_ref().map(|id| id.to_string()),
            entry.description,
            time_text(&entry.at),
        ],
    )?;

    Ok(Transaction {
        id: conn.last_insert_rowid(),
        owner: entry.owner.clone(),
        kind: entry.kind,
        amount: entry.amount,
        balance_after,
        session_id: entry.session_id.clone(),
        description: entry.description.clone(),
        created_at: entry.at,
    })
}

fn apply_credit(conn: &Connection, entry: &LedgerEntry) -> StoreResult<Transaction> {
    let wallet = load_wallet(conn, &entry.owner)?;
    let balance = wallet.as_ref().map(|w| w.balance).unwrap_or(Decimal::ZERO) + entry.amount;
    write_balance(conn, wallet.as_ref(), entry, balance)?;
    append_transaction(conn, entry, balance)
}

fn advisor_rating(conn: &Connection, advisor: &ActorId) -> StoreResult<AdvisorRating> {
    let (sum, count): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(stars), 0), COUNT(*) FROM ratings WHERE advisor_id = ?",
        [advisor.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let average = if count == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(sum) / Decimal::from(count)).round_dp(2)
    };

    Ok(AdvisorRating {
        advisor_id: advisor.clone(),
        average,
        count: u32::try_from(count).unwrap_or(u32::MAX),
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![time_text(&event.timestamp), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| meter_util::now());
            let event: crate::AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn get_wallet(&self, owner: &ActorId) -> StoreResult<Option<Wallet>> {
        let conn = self.lock()?;
        load_wallet(&conn, owner)
    }

    fn credit_wallet(&self, entry: &LedgerEntry) -> StoreResult<Transaction> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let transaction = apply_credit(&tx, entry)?;
        tx.commit()?;

        debug!(
            owner = %entry.owner,
            kind = entry.kind.as_str(),
            amount = %entry.amount,
            balance = %transaction.balance_after,
            "Wallet credited"
        );
        Ok(transaction)
    }

    fn debit_wallet(
        &self,
        entry: &LedgerEntry,
        charge: Option<&SessionCharge>,
    ) -> StoreResult<DebitResult> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let session = match charge {
            Some(charge) => {
                let session = load_session(&tx, &charge.session_id)?
                    .ok_or_else(|| StoreError::NotFound(format!("session {}", charge.session_id)))?;
                if session.status != SessionStatus::Active {
                    return Ok(DebitResult::SessionNotActive {
                        status: session.status,
                    });
                }
                Some(session)
            }
            None => None,
        };

        let wallet = load_wallet(&tx, &entry.owner)?;
        let balance = wallet.as_ref().map(|w| w.balance).unwrap_or(Decimal::ZERO);
        if balance < entry.amount {
            return Ok(DebitResult::Insufficient { balance });
        }

        let new_balance = balance - entry.amount;
        write_balance(&tx, wallet.as_ref(), entry, new_balance)?;
        let transaction = append_transaction(&tx, entry, new_balance)?;

        let session = match (session, charge) {
            (Some(mut session), Some(charge)) => {
                session.total_duration_seconds += charge.duration_seconds;
                session.total_charged += entry.amount;
                session.client_wallet_after = new_balance;
                session.last_activity_time = entry.at;
                tx.execute(
                    "UPDATE sessions SET total_duration_seconds = ?, total_charged = ?,
                         client_wallet_after = ?, last_activity_time = ?
                     WHERE id = ?",
                    params![
                        session.total_duration_seconds as i64,
                        session.total_charged.to_string(),
                        new_balance.to_string(),
                        time_text(&entry.at),
                        session.id.to_string(),
                    ],
                )?;
                Some(session)
            }
            _ => None,
        };

        tx.commit()?;

        debug!(
            owner = %entry.owner,
            amount = %entry.amount,
            balance = %new_balance,
            "Wallet debited"
        );
        Ok(DebitResult::Applied {
            transaction,
            session,
        })
    }

    fn get_transactions(&self, owner: &ActorId, limit: Option<u32>) -> StoreResult<Vec<Transaction>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE owner = ? ORDER BY id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        );
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![owner.as_str(), limit], transaction_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_session_transactions(&self, session_id: &SessionId) -> StoreResult<Vec<Transaction>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE session_id = ? ORDER BY id ASC",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([session_id.to_string()], transaction_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn insert_session(&self, session: &Session) -> StoreResult<()> {
        let conn = self.lock()?;
        let end_reason = session
            .end_reason
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let sql = format!(
            "INSERT INTO sessions ({}) VALUES ({})",
            SESSION_COLUMNS,
            placeholders(18)
        );
        conn.execute(
            &sql,
            params![
                session.id.to_string(),
                session.client_id.as_str(),
                session.advisor_id.as_str(),
                session.channel.as_str(),
                session.rate_per_minute.to_string(),
                session.status.as_str(),
                time_text(&session.start_time),
                session.end_time.as_ref().map(time_text),
                session.paused_at.as_ref().map(time_text),
                session.total_duration_seconds as i64,
                session.total_charged.to_string(),
                session.client_wallet_before.to_string(),
                session.client_wallet_after.to_string(),
                session.advisor_earning.map(|d| d.to_string()),
                time_text(&session.last_activity_time),
                session.rating.map(i64::from),
                session.feedback,
                end_reason,
            ],
        )?;

        debug!(session_id = %session.id, "Session inserted");
        Ok(())
    }

    fn get_session(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        let conn = self.lock()?;
        load_session(&conn, id)
    }

    fn update_session_state(
        &self,
        session: &Session,
        expected: &[SessionStatus],
    ) -> StoreResult<bool> {
        let conn = self.lock()?;
        let end_reason = session
            .end_reason
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let sql = format!(
            "UPDATE sessions SET status = ?, paused_at = ?, end_time = ?, end_reason = ?,
                 last_activity_time = ?
             WHERE id = ? AND status IN ({})",
            placeholders(expected.len())
        );

        let mut args: Vec<Option<String>> = vec![
            Some(session.status.as_str().to_string()),
            session.paused_at.as_ref().map(time_text),
            session.end_time.as_ref().map(time_text),
            end_reason,
            Some(time_text(&session.last_activity_time)),
            Some(session.id.to_string()),
        ];
        args.extend(expected.iter().map(|s| Some(s.as_str().to_string())));

        let changed = conn.execute(&sql, params_from_iter(args))?;
        debug!(
            session_id = %session.id,
            status = session.status.as_str(),
            applied = changed == 1,
            "Session state update"
        );
        Ok(changed == 1)
    }

    fn complete_session(&self, session: &Session, earning: &Earning) -> StoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let end_reason = session
            .end_reason
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let changed = tx.execute(
            "UPDATE sessions SET status = ?, end_time = ?, paused_at = NULL,
                 total_duration_seconds = ?, total_charged = ?, client_wallet_after = ?,
                 advisor_earning = ?, last_activity_time = ?, end_reason = ?
             WHERE id = ? AND status IN ('active', 'paused')",
            params![
                SessionStatus::Completed.as_str(),
                session.end_time.as_ref().map(time_text),
                session.total_duration_seconds as i64,
                session.total_charged.to_string(),
                session.client_wallet_after.to_string(),
                session.advisor_earning.map(|d| d.to_string()),
                time_text(&session.last_activity_time),
                end_reason,
                session.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Ok(false);
        }

        let sql = format!(
            "INSERT INTO earnings ({}) VALUES ({})",
            EARNING_COLUMNS,
            placeholders(11)
        );
        tx.execute(
            &sql,
            params![
                earning.id.to_string(),
                earning.advisor_id.as_str(),
                earning.session_id.to_string(),
                earning.client_id.as_str(),
                earning.channel.as_str(),
                earning.amount.to_string(),
                earning.platform_fee.to_string(),
                earning.duration_seconds as i64,
                earning.status.as_str(),
                time_text(&earning.created_at),
                earning.withdrawn_at.as_ref().map(time_text),
            ],
        )?;

        tx.commit()?;
        debug!(session_id = %session.id, earning_id = %earning.id, "Session completed");
        Ok(true)
    }

    fn list_sessions(&self, query: &SessionQuery) -> StoreResult<Vec<Session>> {
        let conn = self.lock()?;
        let mut sql = format!("SELECT {} FROM sessions WHERE 1 = 1", SESSION_COLUMNS);
        let mut args: Vec<String> = Vec::new();

        if let Some(client) = &query.client {
            sql.push_str(" AND client_id = ?");
            args.push(client.to_string());
        }
        if let Some(advisor) = &query.advisor {
            sql.push_str(" AND advisor_id = ?");
            args.push(advisor.to_string());
        }
        if !query.statuses.is_empty() {
            sql.push_str(&format!(
                " AND status IN ({})",
                placeholders(query.statuses.len())
            ));
            args.extend(query.statuses.iter().map(|s| s.as_str().to_string()));
        }
        sql.push_str(" ORDER BY start_time DESC, rowid DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), session_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_earnings(
        &self,
        advisor: &ActorId,
        status: Option<EarningStatus>,
    ) -> StoreResult<Vec<Earning>> {
        let conn = self.lock()?;
        let mut sql = format!("SELECT {} FROM earnings WHERE advisor_id = ?", EARNING_COLUMNS);
        let mut args = vec![advisor.to_string()];
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            args.push(status.as_str().to_string());
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), earning_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn get_session_earning(&self, session_id: &SessionId) -> StoreResult<Option<Earning>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM earnings WHERE session_id = ?", EARNING_COLUMNS);
        Ok(conn
            .query_row(&sql, [session_id.to_string()], earning_from_row)
            .optional()?)
    }

    fn withdraw_earnings(
        &self,
        advisor: &ActorId,
        ids: &[EarningId],
        currency: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Withdrawal> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut earnings = Vec::new();
        for id in ids {
            let Some(mut earning) = load_earning(&tx, id)? else {
                continue;
            };
            if &earning.advisor_id != advisor || earning.status == EarningStatus::Withdrawn {
                continue;
            }

            tx.execute(
                "UPDATE earnings SET status = ?, withdrawn_at = ? WHERE id = ?",
                params![
                    EarningStatus::Withdrawn.as_str(),
                    time_text(&at),
                    id.to_string()
                ],
            )?;
            earning.status = EarningStatus::Withdrawn;
            earning.withdrawn_at = Some(at);
            earnings.push(earning);
        }

        let amount: Decimal = earnings.iter().map(|e| e.amount).sum();
        let transaction = if amount > Decimal::ZERO {
            let entry = LedgerEntry {
                owner: advisor.clone(),
                kind: TransactionKind::Earning,
                amount,
                session_id: None,
                description: format!("Payout of {} earning(s)", earnings.len()),
                currency: currency.to_string(),
                at,
            };
            Some(apply_credit(&tx, &entry)?)
        } else {
            None
        };

        tx.commit()?;
        debug!(advisor = %advisor, count = earnings.len(), amount = %amount, "Earnings withdrawn");

        Ok(Withdrawal {
            earnings,
            amount,
            transaction,
        })
    }

    fn record_warning(&self, warning: &BalanceWarning) -> StoreResult<bool> {
        let conn = self.lock()?;
        let sql = format!(
            "INSERT OR IGNORE INTO balance_warnings ({}) VALUES (?, ?, ?, ?, ?)",
            WARNING_COLUMNS
        );
        let inserted = conn.execute(
            &sql,
            params![
                warning.session_id.to_string(),
                warning.owner.as_str(),
                warning.kind.as_str(),
                warning.balance.to_string(),
                time_text(&warning.created_at),
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get_warnings(&self, session_id: &SessionId) -> StoreResult<Vec<BalanceWarning>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM balance_warnings WHERE session_id = ? ORDER BY rowid ASC",
            WARNING_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([session_id.to_string()], warning_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn save_rating(&self, rating: &Rating) -> StoreResult<AdvisorRating> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!(
            "INSERT INTO ratings ({}) VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                 stars = excluded.stars,
                 feedback = excluded.feedback,
                 created_at = excluded.created_at",
            RATING_COLUMNS
        );
        tx.execute(
            &sql,
            params![
                rating.session_id.to_string(),
                rating.client_id.as_str(),
                rating.advisor_id.as_str(),
                i64::from(rating.stars),
                rating.feedback,
                time_text(&rating.created_at),
            ],
        )?;
        tx.execute(
            "UPDATE sessions SET rating = ?, feedback = ? WHERE id = ?",
            params![
                i64::from(rating.stars),
                rating.feedback,
                rating.session_id.to_string()
            ],
        )?;

        let aggregate = advisor_rating(&tx, &rating.advisor_id)?;
        tx.commit()?;
        Ok(aggregate)
    }

    fn get_rating(&self, session_id: &SessionId) -> StoreResult<Option<Rating>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM ratings WHERE session_id = ?", RATING_COLUMNS);
        Ok(conn
            .query_row(&sql, [session_id.to_string()], rating_from_row)
            .optional()?)
    }

    fn get_advisor_rating(&self, advisor: &ActorId) -> StoreResult<AdvisorRating> {
        let conn = self.lock()?;
        advisor_rating(&conn, advisor)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
