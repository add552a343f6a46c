//! Persistence layer: one adapter over libSQL (file or Turso) or PostgreSQL,
//! plus per-entity stores that build dialect-aware SQL on top of it.

pub mod chats;
pub mod contacts;
pub mod conversations;
pub mod dialect;
pub mod leads;
pub mod libsql_backend;
pub mod migrations;
pub mod postgres_backend;
pub mod traits;
pub mod value;

use std::sync::Arc;

pub use chats::ChatStore;
pub use contacts::ContactStore;
pub use conversations::ConversationStore;
pub use leads::LeadStore;
pub use dialect::{BackendKind, Dialect, SqlBuilder};
pub use libsql_backend::LibSqlBackend;
pub use postgres_backend::PostgresBackend;
pub use traits::Database;
pub use value::{QueryResult, Row, SqlValue};

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

/// Default page size for list endpoints.
pub const DEFAULT_LIMIT: u32 = 100;

/// Largest page a caller may request.
pub const MAX_LIMIT: u32 = 1000;

/// Limit/offset window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

/// Open the adapter selected by configuration.
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Database>, DatabaseError> {
    let db: Arc<dyn Database> = match config {
        DatabaseConfig::Sqlite { path } => Arc::new(LibSqlBackend::new_local(path).await?),
        DatabaseConfig::Turso { url, auth_token } => {
            Arc::new(LibSqlBackend::new_remote(url, auth_token).await?)
        }
        DatabaseConfig::Postgres(pg) => Arc::new(PostgresBackend::connect(pg).await?),
    };
    Ok(db)
}

/// Generated id of a row just inserted with `Dialect::insert_returning_id`.
pub(crate) fn inserted_id(result: &QueryResult) -> Result<i64, DatabaseError> {
    if let Some(id) = result.last_insert_id {
        return Ok(id);
    }
    result
        .first()
        .ok_or_else(|| DatabaseError::decode("id", "insert reported no generated id"))?
        .integer("id")
}

/// In-memory database with the full schema, for store tests.
#[cfg(test)]
pub(crate) async fn memory_db() -> Arc<dyn Database> {
    let db = LibSqlBackend::new_memory().await.unwrap();
    migrations::init_schema(&db).await.unwrap();
    Arc::new(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_opens_configured_sqlite_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::Sqlite {
            path: tmp.path().join("panel.db"),
        };
        let db = connect(&config).await.unwrap();
        assert_eq!(db.kind(), config.kind());
        db.close().await.unwrap();
    }

    #[test]
    fn inserted_id_prefers_last_insert_id() {
        let result = QueryResult {
            last_insert_id: Some(9),
            ..Default::default()
        };
        assert_eq!(inserted_id(&result).unwrap(), 9);

        let returned = QueryResult {
            rows: vec![Row::new(vec!["id".into()], vec![SqlValue::Integer(4)])],
            row_count: 1,
            last_insert_id: None,
        };
        assert_eq!(inserted_id(&returned).unwrap(), 4);
        assert!(inserted_id(&QueryResult::default()).is_err());
    }
}
