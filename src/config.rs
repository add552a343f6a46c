//! Configuration types, loaded from the environment.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::store::BackendKind;

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default path of the embedded database file.
pub const DEFAULT_SQLITE_PATH: &str = "./conversations.db";

/// Process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    pub port: u16,
    pub database: DatabaseConfig,
    /// Include internal error detail in 500 responses.
    pub expose_error_details: bool,
}

/// Backend selection plus the credentials that backend needs.
#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    /// Embedded libSQL database file.
    Sqlite { path: PathBuf },
    /// Turso (libSQL over the network).
    Turso {
        url: String,
        auth_token: SecretString,
    },
    Postgres(PostgresConfig),
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<SecretString>,
    pub database: String,
    /// Require TLS.
    pub ssl: bool,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Sqlite { .. } => BackendKind::Sqlite,
            Self::Turso { .. } => BackendKind::Turso,
            Self::Postgres(_) => BackendKind::Postgres,
        }
    }
}

impl AppConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(v) => parse_value("PORT", &v)?,
            None => DEFAULT_PORT,
        };
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let expose_error_details = get("EXPOSE_ERROR_DETAILS")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let kind = match get("DATABASE_TYPE") {
            Some(v) => v
                .parse::<BackendKind>()
                .map_err(|message| ConfigError::InvalidValue {
                    key: "DATABASE_TYPE".into(),
                    message,
                })?,
            None if get("POSTGRES_HOST").is_some() => BackendKind::Postgres,
            None if get("TURSO_DATABASE_URL").is_some() => BackendKind::Turso,
            None => BackendKind::Sqlite,
        };

        let database = match kind {
            BackendKind::Sqlite => DatabaseConfig::Sqlite {
                path: PathBuf::from(
                    get("SQLITE_PATH").unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
                ),
            },
            BackendKind::Turso => DatabaseConfig::Turso {
                url: get("TURSO_DATABASE_URL")
                    .ok_or_else(|| ConfigError::MissingEnvVar("TURSO_DATABASE_URL".into()))?,
                auth_token: SecretString::from(get("TURSO_AUTH_TOKEN").unwrap_or_default()),
            },
            BackendKind::Postgres => DatabaseConfig::Postgres(PostgresConfig {
                host: get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: match get("POSTGRES_PORT") {
                    Some(v) => parse_value("POSTGRES_PORT", &v)?,
                    None => 5432,
                },
                user: get("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string()),
                password: get("POSTGRES_PASSWORD").map(SecretString::from),
                database: get("POSTGRES_DATABASE").unwrap_or_else(|| "postgres".to_string()),
                ssl: get("POSTGRES_SSL").is_some_and(|v| v.eq_ignore_ascii_case("true")),
                max_connections: match get("POSTGRES_MAX_CONNECTIONS") {
                    Some(v) => parse_value("POSTGRES_MAX_CONNECTIONS", &v)?,
                    None => 10,
                },
            }),
        };

        Ok(Self {
            bind_addr,
            port,
            database,
            expose_error_details,
        })
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_sqlite() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.expose_error_details);
        match config.database {
            DatabaseConfig::Sqlite { path } => assert_eq!(path, PathBuf::from(DEFAULT_SQLITE_PATH)),
            other => panic!("expected sqlite, got {other:?}"),
        }
    }

    #[test]
    fn postgres_host_selects_postgres() {
        let config = config_from(&[
            ("POSTGRES_HOST", "db.internal"),
            ("POSTGRES_PASSWORD", "hunter2"),
            ("POSTGRES_SSL", "true"),
        ])
        .unwrap();
        assert_eq!(config.database.kind(), BackendKind::Postgres);
        let DatabaseConfig::Postgres(pg) = config.database else {
            panic!("expected postgres");
        };
        assert_eq!(pg.host, "db.internal");
        assert_eq!(pg.port, 5432);
        assert_eq!(pg.user, "postgres");
        assert!(pg.ssl);
        assert_eq!(pg.password.unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn turso_url_selects_turso() {
        let config = config_from(&[
            ("TURSO_DATABASE_URL", "libsql://panel.turso.io"),
            ("TURSO_AUTH_TOKEN", "tok"),
        ])
        .unwrap();
        assert_eq!(config.database.kind(), BackendKind::Turso);
    }

    #[test]
    fn explicit_type_wins_over_inference() {
        let config = config_from(&[
            ("DATABASE_TYPE", "sqlite"),
            ("TURSO_DATABASE_URL", "libsql://panel.turso.io"),
        ])
        .unwrap();
        assert_eq!(config.database.kind(), BackendKind::Sqlite);
    }

    #[test]
    fn turso_without_url_is_an_error() {
        let err = config_from(&[("DATABASE_TYPE", "turso")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "TURSO_DATABASE_URL"));
    }

    #[test]
    fn rejects_unknown_backend_and_bad_port() {
        assert!(config_from(&[("DATABASE_TYPE", "mysql")]).is_err());
        assert!(config_from(&[("PORT", "eighty")]).is_err());
    }

    #[test]
    fn error_details_can_be_hidden() {
        let config = config_from(&[("EXPOSE_ERROR_DETAILS", "false")]).unwrap();
        assert!(!config.expose_error_details);
    }
}
