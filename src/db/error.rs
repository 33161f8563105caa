//! Database errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The connection string does not have the expected shape.
    #[error("invalid connection string `{url}`: {reason}")]
    ConnectionString { url: String, reason: String },

    /// The pool could not be created or could not hand out a connection.
    #[error("connection pool for {target} unavailable: {source}")]
    Pool {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("statement failed ({sql}): {source}")]
    Statement {
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("commit failed: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("rollback failed: {0}")]
    Rollback(#[source] sqlx::Error),

    /// The session was already finished.
    #[error("session is closed")]
    Closed,
}

impl DbError {
    pub(crate) fn statement(sql: &str, source: sqlx::Error) -> Self {
        DbError::Statement {
            sql: sql.to_string(),
            source,
        }
    }
}
