//! Error types for the WhatsApp panel backend.

/// Failures that stop the server from starting or end it early.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("database unavailable: {0}")]
    Database(#[from] DatabaseError),

    #[error("server socket failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Database connection is closed")]
    Closed,

    #[error("Failed to decode column {column}: {reason}")]
    Decode { column: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Schema initialization failed: {0}")]
    Migration(String),
}

impl DatabaseError {
    pub(crate) fn decode(column: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<libsql::Error> for DatabaseError {
    fn from(e: libsql::Error) -> Self {
        Self::Query(e.to_string())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolClosed => Self::Closed,
            sqlx::Error::PoolTimedOut => Self::Pool(e.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_error_names_the_failing_stage() {
        let err: StartupError = ConfigError::MissingEnvVar("TURSO_DATABASE_URL".into()).into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: Missing required environment variable: TURSO_DATABASE_URL"
        );

        let err: StartupError = DatabaseError::Closed.into();
        assert!(matches!(err, StartupError::Database(DatabaseError::Closed)));
    }
}
