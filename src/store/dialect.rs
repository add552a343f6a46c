//! SQL dialects: the per-backend query text differences.
//!
//! Entity stores never branch on the backend. They ask the `Dialect` for the
//! pieces that differ (placeholders, upsert, returning-id inserts, the
//! case-insensitive match operator, "is today" predicates, DDL) and build
//! statements through [`SqlBuilder`], which numbers placeholders correctly.

use std::fmt;
use std::str::FromStr;

use super::value::SqlValue;

/// Which backend the process talks to. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Embedded libSQL/SQLite database file.
    Sqlite,
    /// Turso, the hosted libSQL service.
    Turso,
    Postgres,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Turso => "turso",
            Self::Postgres => "postgres",
        }
    }

    /// The dialect this backend speaks.
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            Self::Sqlite | Self::Turso => &SqliteDialect,
            Self::Postgres => &PostgresDialect,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "turso" | "libsql" => Ok(Self::Turso),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(format!("unknown database type '{other}'")),
        }
    }
}

/// Query text that varies by backend.
pub trait Dialect: Send + Sync {
    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Operator for case-insensitive `LIKE`.
    fn ilike(&self) -> &'static str;

    /// Predicate that is true when `column` falls on the current calendar date.
    fn is_today(&self, column: &str) -> String;

    /// Whether `INSERT ... RETURNING id` is how this backend reports new ids.
    /// Otherwise the adapter fills `last_insert_id`.
    fn returns_inserted_id(&self) -> bool;

    /// `CREATE ... IF NOT EXISTS` statements for every table and index.
    fn schema(&self) -> &'static [&'static str];

    /// Query listing user tables as a `table_name` text column.
    fn list_tables(&self) -> &'static str;

    /// Insert one row into `table`, reporting the generated `id` the way the
    /// backend does.
    fn insert_returning_id(&self, table: &str, columns: &[&str]) -> String {
        let mut sql = self.insert(table, columns);
        if self.returns_inserted_id() {
            sql.push_str(" RETURNING id");
        }
        sql
    }

    /// Plain single-row insert.
    fn insert(&self, table: &str, columns: &[&str]) -> String {
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| self.placeholder(i)).collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// Insert-or-update on the unique `conflict` column. `assignments` are raw
    /// `SET` fragments and may refer to the incoming row as `excluded.<col>`
    /// and to the stored row as `<table>.<col>`.
    fn upsert(&self, table: &str, columns: &[&str], conflict: &str, assignments: &[&str]) -> String {
        format!(
            "{} ON CONFLICT ({conflict}) DO UPDATE SET {}",
            self.insert(table, columns),
            assignments.join(", ")
        )
    }
}

/// SQLite and libSQL (local file and Turso).
#[derive(Debug, Clone, Copy)]
pub struct SqliteDialect;

/// PostgreSQL.
#[derive(Debug, Clone, Copy)]
pub struct PostgresDialect;

impl Dialect for SqliteDialect {
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn ilike(&self) -> &'static str {
        // ASCII case-insensitive by default in SQLite
        "LIKE"
    }

    fn is_today(&self, column: &str) -> String {
        format!("DATE({column}) = DATE('now')")
    }

    fn returns_inserted_id(&self) -> bool {
        false
    }

    fn schema(&self) -> &'static [&'static str] {
        SQLITE_SCHEMA
    }

    fn list_tables(&self) -> &'static str {
        "SELECT name AS table_name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
    }
}

impl Dialect for PostgresDialect {
    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn ilike(&self) -> &'static str {
        "ILIKE"
    }

    fn is_today(&self, column: &str) -> String {
        format!("DATE({column}) = CURRENT_DATE")
    }

    fn returns_inserted_id(&self) -> bool {
        true
    }

    fn schema(&self) -> &'static [&'static str] {
        POSTGRES_SCHEMA
    }

    fn list_tables(&self) -> &'static str {
        "SELECT table_name::text AS table_name FROM information_schema.tables \
         WHERE table_schema = 'public' ORDER BY table_name"
    }
}

static SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phone_number TEXT NOT NULL,
        contact_name TEXT,
        message TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'received',
        timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        status TEXT NOT NULL DEFAULT 'pending',
        metadata TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        phone_number TEXT UNIQUE NOT NULL,
        name TEXT,
        last_interaction TEXT,
        total_messages INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS leads (
        id TEXT PRIMARY KEY,
        numero TEXT NOT NULL,
        nome TEXT,
        followupsequencia TEXT,
        followupsequenciamsgid TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        trava INTEGER NOT NULL DEFAULT 0
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_phone ON conversations(phone_number)",
    "CREATE INDEX IF NOT EXISTS idx_conversations_timestamp ON conversations(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_leads_numero ON leads(numero)",
    "CREATE INDEX IF NOT EXISTS idx_chats_session ON chats(session_id)",
];

static POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS conversations (
        id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        phone_number TEXT NOT NULL,
        contact_name TEXT,
        message TEXT NOT NULL,
        message_type TEXT NOT NULL DEFAULT 'received',
        timestamp TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        status TEXT NOT NULL DEFAULT 'pending',
        metadata JSONB
    )"#,
    r#"CREATE TABLE IF NOT EXISTS contacts (
        id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        phone_number TEXT UNIQUE NOT NULL,
        name TEXT,
        last_interaction TIMESTAMPTZ,
        total_messages BIGINT NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active'
    )"#,
    r#"CREATE TABLE IF NOT EXISTS leads (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        numero VARCHAR(255) NOT NULL,
        nome VARCHAR(255),
        followupsequencia VARCHAR(255),
        followupsequenciamsgid VARCHAR(255),
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        trava BOOLEAN NOT NULL DEFAULT FALSE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chats (
        id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        session_id VARCHAR(255) NOT NULL,
        message JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_conversations_phone ON conversations(phone_number)",
    "CREATE INDEX IF NOT EXISTS idx_conversations_timestamp ON conversations(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_leads_numero ON leads(numero)",
    "CREATE INDEX IF NOT EXISTS idx_chats_session ON chats(session_id)",
];

/// Incrementally builds one statement and its positional parameters.
///
/// `bind` appends a parameter and returns the placeholder text to splice in,
/// so `$n` numbering always matches parameter order.
pub struct SqlBuilder {
    dialect: &'static dyn Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    pub fn new(dialect: &'static dyn Dialect, sql: impl Into<String>) -> Self {
        Self {
            dialect,
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Register a parameter, returning its placeholder.
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> String {
        self.params.push(value.into());
        self.dialect.placeholder(self.params.len())
    }

    pub fn push(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Append `WHERE a AND b ...` when there are any conditions.
    pub fn push_where(&mut self, conditions: &[String]) -> &mut Self {
        if !conditions.is_empty() {
            self.sql.push_str(" WHERE ");
            self.sql.push_str(&conditions.join(" AND "));
        }
        self
    }

    /// Append `ORDER BY <order> LIMIT .. OFFSET ..` with bound values.
    pub fn paginate(&mut self, order_by: &str, limit: u32, offset: u32) -> &mut Self {
        let l = self.bind(limit);
        let o = self.bind(offset);
        self.sql
            .push_str(&format!(" ORDER BY {order_by} LIMIT {l} OFFSET {o}"));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn build(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }
}
