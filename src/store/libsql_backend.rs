//! libSQL backend: serves both the embedded database file and Turso.
//!
//! One connection is shared by all requests. Statements are serialised on it
//! so `changes` and `last_insert_rowid` always describe the statement that
//! just ran.

use std::path::Path;

use async_trait::async_trait;
use libsql::params::Params;
use libsql::{Connection, Database as LibSqlDatabase};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::dialect::BackendKind;
use super::traits::{Database, is_insert, returns_rows};
use super::value::{QueryResult, Row, SQLITE_TIMESTAMP_FORMAT, SqlValue};
use crate::error::DatabaseError;

/// libSQL database backend.
pub struct LibSqlBackend {
    kind: BackendKind,
    #[allow(dead_code)]
    db: LibSqlDatabase,
    /// `None` once closed.
    conn: Mutex<Option<Connection>>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::with_database(BackendKind::Sqlite, db)?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::with_database(BackendKind::Sqlite, db)
    }

    /// Connect to a Turso database over the network.
    pub async fn new_remote(url: &str, auth_token: &SecretString) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.expose_secret().to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open Turso database: {e}")))?;

        let backend = Self::with_database(BackendKind::Turso, db)?;
        info!(url = %url, "Turso database connected");
        Ok(backend)
    }

    fn with_database(kind: BackendKind, db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        Ok(Self {
            kind,
            db,
            conn: Mutex::new(Some(conn)),
        })
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn to_libsql(value: SqlValue) -> libsql::Value {
    match value {
        SqlValue::Null => libsql::Value::Null,
        SqlValue::Integer(i) => libsql::Value::Integer(i),
        SqlValue::Real(f) => libsql::Value::Real(f),
        SqlValue::Text(s) => libsql::Value::Text(s),
        SqlValue::Bool(b) => libsql::Value::Integer(i64::from(b)),
        SqlValue::Json(v) => libsql::Value::Text(v.to_string()),
        SqlValue::Timestamp(ts) => {
            libsql::Value::Text(ts.format(SQLITE_TIMESTAMP_FORMAT).to_string())
        }
        SqlValue::Uuid(u) => libsql::Value::Text(u.to_string()),
    }
}

fn from_libsql(value: libsql::Value) -> SqlValue {
    match value {
        libsql::Value::Null => SqlValue::Null,
        libsql::Value::Integer(i) => SqlValue::Integer(i),
        libsql::Value::Real(f) => SqlValue::Real(f),
        libsql::Value::Text(s) => SqlValue::Text(s),
        libsql::Value::Blob(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Map a libsql Row to a backend-neutral [`Row`].
fn convert_row(row: &libsql::Row) -> Result<Row, DatabaseError> {
    let count = row.column_count();
    let mut columns = Vec::with_capacity(count.max(0) as usize);
    let mut values = Vec::with_capacity(count.max(0) as usize);
    for idx in 0..count {
        columns.push(row.column_name(idx).unwrap_or_default().to_string());
        values.push(from_libsql(row.get_value(idx)?));
    }
    Ok(Row::new(columns, values))
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult, DatabaseError> {
        let guard = self.conn.lock().await;
        let conn = guard.as_ref().ok_or(DatabaseError::Closed)?;
        let params = Params::Positional(params.into_iter().map(to_libsql).collect());

        if returns_rows(sql) {
            let mut rows = conn.query(sql, params).await?;
            let mut out = Vec::new();
            while let Some(row) = rows.next().await? {
                out.push(convert_row(&row)?);
            }
            debug!(rows = out.len(), "libSQL query");
            Ok(QueryResult {
                row_count: out.len() as u64,
                rows: out,
                last_insert_id: None,
            })
        } else {
            let changed = conn.execute(sql, params).await?;
            let last_insert_id = is_insert(sql).then(|| conn.last_insert_rowid());
            debug!(changed, ?last_insert_id, "libSQL statement");
            Ok(QueryResult {
                rows: Vec::new(),
                row_count: changed,
                last_insert_id,
            })
        }
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        if self.conn.lock().await.take().is_some() {
            info!(backend = %self.kind, "Database connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> LibSqlBackend {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.execute(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT, flag INTEGER, meta TEXT)",
            vec![],
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn insert_reports_last_insert_id() {
        let db = test_db().await;
        let first = db
            .execute("INSERT INTO notes (body) VALUES (?)", vec!["a".into()])
            .await
            .unwrap();
        let second = db
            .execute("INSERT INTO notes (body) VALUES (?)", vec!["b".into()])
            .await
            .unwrap();
        assert_eq!(first.last_insert_id, Some(1));
        assert_eq!(second.last_insert_id, Some(2));
        assert_eq!(second.row_count, 1);
    }

    #[tokio::test]
    async fn select_returns_named_columns() {
        let db = test_db().await;
        db.execute(
            "INSERT INTO notes (body, flag, meta) VALUES (?, ?, ?)",
            vec!["hello".into(), true.into(), serde_json::json!({"k": "v"}).into()],
        )
        .await
        .unwrap();

        let result = db
            .execute("SELECT * FROM notes WHERE body = ?", vec!["hello".into()])
            .await
            .unwrap();
        assert_eq!(result.row_count, 1);
        let row = result.first().unwrap();
        assert_eq!(row.columns(), ["id", "body", "flag", "meta"]);
        assert_eq!(row.text("body").unwrap(), "hello");
        assert!(row.boolean("flag").unwrap());
        assert_eq!(row.json("meta").unwrap()["k"], "v");
    }

    #[tokio::test]
    async fn update_reports_affected_rows() {
        let db = test_db().await;
        let result = db
            .execute("UPDATE notes SET body = ? WHERE id = ?", vec!["x".into(), 42i64.into()])
            .await
            .unwrap();
        assert_eq!(result.row_count, 0);
        assert_eq!(result.last_insert_id, None);
    }

    #[tokio::test]
    async fn driver_errors_are_query_errors() {
        let db = test_db().await;
        let err = db.execute("SELECT * FROM missing_table", vec![]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let db = test_db().await;
        db.close().await.unwrap();
        db.close().await.unwrap();
        let err = db.execute("SELECT 1", vec![]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Closed));
    }

    #[tokio::test]
    async fn local_file_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("panel.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert_eq!(db.kind(), BackendKind::Sqlite);
        db.execute("SELECT 1", vec![]).await.unwrap();
        assert!(db_path.exists());
    }
}
