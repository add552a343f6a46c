//! PostgreSQL backend over an `sqlx` connection pool.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use tracing::{debug, info};

use super::dialect::BackendKind;
use super::traits::{Database, returns_rows};
use super::value::{QueryResult, Row, SqlValue};
use crate::config::PostgresConfig;
use crate::error::DatabaseError;

/// PostgreSQL database backend.
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    /// Open a pool and verify one connection can be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(connect_options(config))
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to connect to PostgreSQL: {e}")))?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            ssl = config.ssl,
            "PostgreSQL pool opened"
        );
        Ok(Self { pool })
    }

    /// Build a pool that connects on first use.
    #[cfg(test)]
    pub(crate) fn connect_lazy(config: &PostgresConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(connect_options(config));
        Self { pool }
    }
}

fn connect_options(config: &PostgresConfig) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .database(&config.database)
        .ssl_mode(if config.ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Disable
        });
    match &config.password {
        Some(password) => options.password(password.expose_secret()),
        None => options,
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn bind_value(
    query: Query<'_, Postgres, PgArguments>,
    value: SqlValue,
) -> Query<'_, Postgres, PgArguments> {
    match value {
        // Untyped NULLs are sent as TEXT; nullable parameters are all text columns.
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Integer(i) => query.bind(i),
        SqlValue::Real(f) => query.bind(f),
        SqlValue::Text(s) => query.bind(s),
        SqlValue::Bool(b) => query.bind(b),
        SqlValue::Json(v) => query.bind(v),
        SqlValue::Timestamp(ts) => query.bind(ts),
        SqlValue::Uuid(u) => query.bind(u),
    }
}

fn decode<'r, T>(row: &'r PgRow, idx: usize, column: &str) -> Result<Option<T>, DatabaseError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| DatabaseError::decode(column, e.to_string()))
}

/// Map a Postgres row to a backend-neutral [`Row`], keyed on the wire type.
fn convert_row(row: &PgRow) -> Result<Row, DatabaseError> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (idx, col) in row.columns().iter().enumerate() {
        let name = col.name();
        let value = match col.type_info().name() {
            "INT2" => decode::<i16>(row, idx, name)?.map(|v| SqlValue::Integer(v.into())),
            "INT4" => decode::<i32>(row, idx, name)?.map(|v| SqlValue::Integer(v.into())),
            "INT8" => decode::<i64>(row, idx, name)?.map(SqlValue::Integer),
            "FLOAT4" => decode::<f32>(row, idx, name)?.map(|v| SqlValue::Real(v.into())),
            "FLOAT8" => decode::<f64>(row, idx, name)?.map(SqlValue::Real),
            "BOOL" => decode::<bool>(row, idx, name)?.map(SqlValue::Bool),
            "JSON" | "JSONB" => decode::<serde_json::Value>(row, idx, name)?.map(SqlValue::Json),
            "TIMESTAMPTZ" => decode::<chrono::DateTime<chrono::Utc>>(row, idx, name)?
                .map(SqlValue::Timestamp),
            "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, idx, name)?
                .map(|v| SqlValue::Timestamp(v.and_utc())),
            "DATE" => decode::<chrono::NaiveDate>(row, idx, name)?
                .map(|v| SqlValue::Text(v.to_string())),
            "UUID" => decode::<uuid::Uuid>(row, idx, name)?.map(SqlValue::Uuid),
            _ => decode::<String>(row, idx, name)?.map(SqlValue::Text),
        };
        columns.push(name.to_string());
        values.push(value.unwrap_or(SqlValue::Null));
    }

    Ok(Row::new(columns, values))
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn execute(&self, sql: &str, params: Vec<SqlValue>) -> Result<QueryResult, DatabaseError> {
        if self.pool.is_closed() {
            return Err(DatabaseError::Closed);
        }

        let query = params
            .into_iter()
            .fold(sqlx::query(sql), bind_value);

        if returns_rows(sql) {
            let rows = query.fetch_all(&self.pool).await?;
            let rows = rows.iter().map(convert_row).collect::<Result<Vec<_>, _>>()?;
            debug!(rows = rows.len(), "PostgreSQL query");
            Ok(QueryResult {
                row_count: rows.len() as u64,
                rows,
                last_insert_id: None,
            })
        } else {
            let done = query.execute(&self.pool).await?;
            debug!(changed = done.rows_affected(), "PostgreSQL statement");
            Ok(QueryResult {
                rows: Vec::new(),
                row_count: done.rows_affected(),
                last_insert_id: None,
            })
        }
    }

    async fn close(&self) -> Result<(), DatabaseError> {
        if !self.pool.is_closed() {
            self.pool.close().await;
            info!("PostgreSQL pool closed");
        }
        Ok(())
    }
}
