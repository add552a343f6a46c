//! Backend-neutral parameter and row values.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;

/// A single positional parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Text layout used for timestamps on the SQLite-family backends.
///
/// Sorts lexicographically and is understood by SQLite's `DATE()`.
pub const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Parse an RFC 3339 or SQLite datetime string into `DateTime<Utc>`.
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime() output, with or without fractional seconds
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// Deserialize a field that distinguishes "absent" from explicit `null`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: an absent
/// key stays `None`, `null` becomes `Some(None)`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// Deserialize an optional field that may be absent but never `null`.
///
/// Use with `#[serde(default, deserialize_with = "non_null")]` on columns
/// declared `NOT NULL`.
pub fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    match <Option<T> as serde::Deserialize>::deserialize(deserializer)? {
        Some(value) => Ok(Some(value)),
        None => Err(serde::de::Error::custom("cannot be null")),
    }
}

/// One result row: column names paired with values, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<SqlValue>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw value of a column, `None` if the column is absent.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    fn require(&self, column: &str) -> Result<&SqlValue, DatabaseError> {
        self.get(column)
            .ok_or_else(|| DatabaseError::decode(column, "column missing from result"))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, DatabaseError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(s) => Ok(Some(s.clone())),
            SqlValue::Uuid(u) => Ok(Some(u.to_string())),
            SqlValue::Integer(i) => Ok(Some(i.to_string())),
            SqlValue::Json(serde_json::Value::String(s)) => Ok(Some(s.clone())),
            other => Err(DatabaseError::decode(column, format!("expected text, got {other:?}"))),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, DatabaseError> {
        self.opt_text(column)?
            .ok_or_else(|| DatabaseError::decode(column, "unexpected NULL"))
    }

    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>, DatabaseError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(i) => Ok(Some(*i)),
            SqlValue::Bool(b) => Ok(Some(i64::from(*b))),
            SqlValue::Text(s) => s
                .parse()
                .map(Some)
                .map_err(|_| DatabaseError::decode(column, format!("not an integer: {s}"))),
            other => Err(DatabaseError::decode(column, format!("expected integer, got {other:?}"))),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, DatabaseError> {
        self.opt_integer(column)?
            .ok_or_else(|| DatabaseError::decode(column, "unexpected NULL"))
    }

    /// Booleans come back as `BOOLEAN` from PostgreSQL and as 0/1 from SQLite.
    pub fn boolean(&self, column: &str) -> Result<bool, DatabaseError> {
        match self.require(column)? {
            SqlValue::Null => Ok(false),
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Integer(i) => Ok(*i != 0),
            SqlValue::Text(s) => Ok(matches!(s.as_str(), "1" | "true" | "t")),
            other => Err(DatabaseError::decode(column, format!("expected boolean, got {other:?}"))),
        }
    }

    pub fn opt_timestamp(&self, column: &str) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        match self.require(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Timestamp(ts) => Ok(Some(*ts)),
            SqlValue::Text(s) => parse_datetime(s)
                .map(Some)
                .ok_or_else(|| DatabaseError::decode(column, format!("not a timestamp: {s}"))),
            other => Err(DatabaseError::decode(column, format!("expected timestamp, got {other:?}"))),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
        self.opt_timestamp(column)?
            .ok_or_else(|| DatabaseError::decode(column, "unexpected NULL"))
    }

    /// JSON columns are `JSONB` on PostgreSQL and serialized text on SQLite.
    pub fn json(&self, column: &str) -> Result<serde_json::Value, DatabaseError> {
        match self.require(column)? {
            SqlValue::Null => Ok(serde_json::Value::Null),
            SqlValue::Json(v) => Ok(v.clone()),
            SqlValue::Text(s) => Ok(serde_json::from_str(s)
                .unwrap_or_else(|_| serde_json::Value::String(s.clone()))),
            other => Err(DatabaseError::decode(column, format!("expected JSON, got {other:?}"))),
        }
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid, DatabaseError> {
        match self.require(column)? {
            SqlValue::Uuid(u) => Ok(*u),
            SqlValue::Text(s) => Uuid::parse_str(s)
                .map_err(|e| DatabaseError::decode(column, e.to_string())),
            other => Err(DatabaseError::decode(column, format!("expected UUID, got {other:?}"))),
        }
    }
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Rows returned for reads, rows affected for writes.
    pub row_count: u64,
    /// Auto-increment id of the inserted row, on backends that report one.
    pub last_insert_id: Option<i64>,
}

impl QueryResult {
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Read a `COUNT(*) AS count` style scalar from the first row.
    pub fn count(&self, column: &str) -> Result<i64, DatabaseError> {
        self.first()
            .ok_or_else(|| DatabaseError::decode(column, "aggregate returned no rows"))?
            .integer(column)
    }
}
