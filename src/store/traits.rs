//! Unified `Database` trait: one async `execute` contract over every backend.

use async_trait::async_trait;

use super::dialect::{BackendKind, Dialect};
use super::value::{QueryResult, SqlValue};
use crate::error::DatabaseError;

/// Backend-agnostic database adapter.
///
/// Exactly one implementation is constructed per process. Statements use the
/// placeholder style of [`Database::dialect`]; driver faults surface as
/// [`DatabaseError`] and are never retried here.
#[async_trait]
pub trait Database: Send + Sync {
    /// Which backend this adapter talks to.
    fn kind(&self) -> BackendKind;

    /// Query-text rules for this backend.
    fn dialect(&self) -> &'static dyn Dialect {
        self.kind().dialect()
    }

    /// Run one statement with positional parameters.
    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult, DatabaseError>;

    /// Release the underlying connection or pool. Safe to call more than once.
    async fn close(&self) -> Result<(), DatabaseError>;
}

/// Whether a statement produces a result set.
pub(crate) fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().to_ascii_uppercase();
    head.starts_with("SELECT")
        || head.starts_with("WITH")
        || head.starts_with("PRAGMA")
        || head.contains(" RETURNING ")
        || head.ends_with(" RETURNING")
}

/// Whether a statement is an `INSERT`.
pub(crate) fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("INSERT"))
}
