//! Database access.
//!
//! # Data Flow
//! ```text
//! connection string
//!     → url.rs (validate shape)
//!     → pool.rs (one sqlx pool per string, cached for the process)
//!     → session.rs (lazy transaction, commit/rollback at scope end)
//!     → row.rs (rows as JSON objects)
//! ```
//!
//! Statements use `?` placeholders (MySQL, SQLite). PostgreSQL needs `$1`
//! style placeholders, which are passed through unchanged.

pub mod error;
pub mod pool;
pub mod row;
pub mod session;
pub mod url;

pub use error::DbError;
pub use pool::{get_pool, is_cached, DbPool, PoolSettings};
pub use row::Row;
pub use session::{with_session, Cursor, SessionState, SessionSummary, TxOutcome, TxSession};
pub use url::{ConnectionSpec, Scheme};
