//! Transactional database sessions.
//!
//! # Data Flow
//! ```text
//! TxSession::new(pool)                      state: Idle
//!     → execute()   begins the transaction  state: Active
//!     → query()     reads inside it, or straight from the pool when Idle
//!     → finish(Ok)  commit                  state: Committing → Closed
//!     → finish(Err) rollback                state: RollingBack → Closed
//! ```
//!
//! # Design Decisions
//! - At most one transaction per session, opened lazily by the first write
//! - Every statement is tracked as a cursor; all are closed together when the
//!   session ends, exactly once, whatever the outcome
//! - A failing scope always reports its own error; cleanup errors are logged
//! - Dropping an unfinished session rolls back (sqlx does this on drop)

use std::fmt;

use futures_util::future::BoxFuture;
use serde_json::Value;
use sqlx::{Any, Transaction};

use crate::db::error::DbError;
use crate::db::pool::{get_pool, DbPool, PoolSettings};
use crate::db::row::{bind_args, to_row, Row};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Committing,
    RollingBack,
    Closed,
}

/// A statement run through the session.
#[derive(Debug, Clone)]
pub struct Cursor {
    id: usize,
    sql: String,
    rows: u64,
    closed: bool,
}

impl Cursor {
    fn new(id: usize, sql: &str, rows: u64) -> Self {
        Self {
            id,
            sql: sql.to_string(),
            rows,
            closed: false,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Rows affected or returned.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns `false` if the cursor was already closed.
    fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Nothing was written, so no transaction was opened.
    NoTransaction,
    Committed,
    RolledBack,
}

impl TxOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            TxOutcome::NoTransaction => "none",
            TxOutcome::Committed => "committed",
            TxOutcome::RolledBack => "rolled_back",
        }
    }
}

/// What happened when a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub outcome: TxOutcome,
    pub cursors_opened: usize,
    pub cursors_closed: usize,
}

/// A unit of work on one pooled database.
pub struct TxSession {
    pool: DbPool,
    tx: Option<Transaction<'static, Any>>,
    cursors: Vec<Cursor>,
    state: SessionState,
}

impl fmt::Debug for TxSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxSession")
            .field("state", &self.state)
            .field("cursors", &self.cursors.len())
            .finish_non_exhaustive()
    }
}

impl TxSession {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            tx: None,
            cursors: Vec::new(),
            state: SessionState::Idle,
        }
    }

    /// Session on the shared pool for `url`.
    pub fn open(url: &str, settings: PoolSettings) -> Result<Self, DbError> {
        Ok(Self::new(get_pool(url, settings)?))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursors(&self) -> &[Cursor] {
        &self.cursors
    }

    /// Run a write statement inside the session's transaction, opening it on
    /// first use. Returns the number of affected rows.
    pub async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64, DbError> {
        self.ensure_open()?;
        tracing::info!(sql = %sql, args = ?args, "execute");

        let tx = match &mut self.tx {
            Some(tx) => tx,
            slot @ None => {
                let tx = self.pool.begin().await.map_err(DbError::Begin)?;
                self.state = SessionState::Active;
                tracing::debug!("Transaction opened");
                slot.insert(tx)
            }
        };

        let result = bind_args(sqlx::query(sql), args)
            .execute(&mut **tx)
            .await
            .map_err(|e| DbError::statement(sql, e))?;
        let rows = result.rows_affected();
        self.track(sql, rows);
        Ok(rows)
    }

    /// Read rows. Runs inside the transaction when one is open, otherwise
    /// directly on the pool; never opens a transaction.
    pub async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DbError> {
        self.ensure_open()?;
        tracing::info!(sql = %sql, args = ?args, "query");

        let query = bind_args(sqlx::query(sql), args);
        let rows = match self.tx.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await,
            None => query.fetch_all(&self.pool).await,
        }
        .map_err(|e| DbError::statement(sql, e))?;

        self.track(sql, rows.len() as u64);
        Ok(rows.iter().map(to_row).collect())
    }

    /// First row of a read, if any.
    pub async fn query_one(&mut self, sql: &str, args: &[Value]) -> Result<Option<Row>, DbError> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    /// End the session: commit or roll back the transaction if one was opened,
    /// then close every cursor.
    ///
    /// The session is `Closed` afterwards even when the commit or rollback
    /// fails; closing it again returns [`DbError::Closed`].
    pub async fn close(&mut self, commit: bool) -> Result<SessionSummary, DbError> {
        if self.state == SessionState::Closed {
            return Err(DbError::Closed);
        }
        let result = match self.tx.take() {
            None => Ok(TxOutcome::NoTransaction),
            Some(tx) if commit => {
                self.state = SessionState::Committing;
                tx.commit()
                    .await
                    .map(|()| TxOutcome::Committed)
                    .map_err(DbError::Commit)
            }
            Some(tx) => {
                self.state = SessionState::RollingBack;
                tx.rollback()
                    .await
                    .map(|()| TxOutcome::RolledBack)
                    .map_err(DbError::Rollback)
            }
        };

        let cursors_closed = self.close_cursors();
        self.state = SessionState::Closed;

        match result {
            Ok(outcome) => {
                metrics::record_transaction(outcome.as_str());
                tracing::debug!(outcome = outcome.as_str(), cursors = cursors_closed, "Session closed");
                Ok(SessionSummary {
                    outcome,
                    cursors_opened: self.cursors.len(),
                    cursors_closed,
                })
            }
            Err(err) => {
                metrics::record_transaction("failed");
                tracing::error!(error = %err, "Session cleanup failed");
                Err(err)
            }
        }
    }

    /// Close the session according to `outcome`: commit on `Ok`, roll back
    /// on `Err`.
    ///
    /// A commit failure replaces a successful result. A rollback failure is
    /// only logged; the original error is returned.
    pub async fn finish<T, E>(mut self, outcome: Result<T, E>) -> Result<T, E>
    where
        E: From<DbError> + fmt::Display,
    {
        match outcome {
            Ok(value) => {
                self.close(true).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(cleanup) = self.close(false).await {
                    tracing::error!(error = %cleanup, original = %err, "Rollback failed, keeping original error");
                }
                Err(err)
            }
        }
    }

    fn ensure_open(&self) -> Result<(), DbError> {
        match self.state {
            SessionState::Idle | SessionState::Active => Ok(()),
            _ => Err(DbError::Closed),
        }
    }

    fn track(&mut self, sql: &str, rows: u64) {
        let id = self.cursors.len();
        self.cursors.push(Cursor::new(id, sql, rows));
    }

    fn close_cursors(&mut self) -> usize {
        self.cursors.iter_mut().map(Cursor::close).filter(|closed| *closed).count()
    }
}

impl Drop for TxSession {
    fn drop(&mut self) {
        self.close_cursors();
        if self.tx.is_some() {
            tracing::warn!(
                cursors = self.cursors.len(),
                "Session dropped with an open transaction, rolling back"
            );
            metrics::record_transaction("abandoned");
        }
    }
}

/// Run `f` in a fresh session on `pool`, committing if it succeeds and
/// rolling back if it fails.
///
/// ```ignore
/// with_session(&pool, |db| Box::pin(async move {
///     db.execute("UPDATE account SET remark = ? WHERE id = ?", &[remark, id]).await?;
///     db.execute("UPDATE account SET admin = ? WHERE id = ?", &[admin, id]).await?;
///     Ok::<_, DbError>(())
/// })).await?;
/// ```
pub async fn with_session<T, E, F>(pool: &DbPool, f: F) -> Result<T, E>
where
    F: for<'s> FnOnce(&'s mut TxSession) -> BoxFuture<'s, Result<T, E>>,
    E: From<DbError> + fmt::Display,
{
    let mut session = TxSession::new(pool.clone());
    let outcome = f(&mut session).await;
    session.finish(outcome).await
}
