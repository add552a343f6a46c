//! Service info, liveness and the database debug probe.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use secrecy::ExposeSecret;
use serde_json::{Value, json};

use super::AppState;
use super::error::ApiError;
use crate::config::DatabaseConfig;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/debug", get(debug))
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "message": "WhatsApp panel API",
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
        "database": { "type": state.db.kind().as_str() },
        "endpoints": {
            "health": "GET /health",
            "debug": "GET /api/debug",
            "websocket": "GET /ws",
            "stats": "GET /api/stats",
            "conversations": {
                "webhook": "POST /api/webhook/message",
                "getAll": "GET /api/conversations",
                "getById": "GET /api/conversations/{id}",
                "create": "POST /api/conversations",
                "update": "PUT /api/conversations/{id}",
                "updateStatus": "PUT /api/conversations/{id}/status",
                "delete": "DELETE /api/conversations/{id}",
                "stats": "GET /api/conversations/stats"
            },
            "contacts": {
                "getAll": "GET /api/contacts",
                "getByPhone": "GET /api/contacts/{phone_number}",
                "create": "POST /api/contacts",
                "update": "PUT /api/contacts/{phone_number}",
                "delete": "DELETE /api/contacts/{phone_number}",
                "stats": "GET /api/contacts/stats"
            },
            "leads": {
                "getAll": "GET /api/leads",
                "getById": "GET /api/leads/{id}",
                "create": "POST /api/leads",
                "update": "PUT /api/leads/{id}",
                "delete": "DELETE /api/leads/{id}",
                "stats": "GET /api/leads/stats"
            },
            "chats": {
                "getAll": "GET /api/chats",
                "getById": "GET /api/chats/{id}",
                "getBySession": "GET /api/chats/session/{session_id}",
                "sessions": "GET /api/chats/sessions",
                "create": "POST /api/chats",
                "update": "PUT /api/chats/{id}",
                "delete": "DELETE /api/chats/{id}",
                "stats": "GET /api/chats/stats"
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

fn set_or_unset(is_set: bool) -> &'static str {
    if is_set { "SET" } else { "NOT SET" }
}

/// Connection settings with secrets reduced to set/unset.
fn describe(config: &DatabaseConfig) -> Value {
    match config {
        DatabaseConfig::Sqlite { path } => json!({ "path": path.display().to_string() }),
        DatabaseConfig::Turso { url, auth_token } => json!({
            "url": url,
            "auth_token": set_or_unset(!auth_token.expose_secret().is_empty()),
        }),
        DatabaseConfig::Postgres(pg) => json!({
            "host": pg.host,
            "port": pg.port,
            "user": pg.user,
            "password": set_or_unset(pg.password.is_some()),
            "database": pg.database,
            "ssl": pg.ssl,
            "max_connections": pg.max_connections,
        }),
    }
}

async fn debug(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let probe = state
        .db
        .execute("SELECT 1 AS test", Vec::new())
        .await
        .map_err(ApiError::database("Database connection test failed"))?;
    let test = probe
        .count("test")
        .map_err(ApiError::database("Database connection test failed"))?;

    let tables = state
        .db
        .execute(state.db.dialect().list_tables(), Vec::new())
        .await
        .map_err(ApiError::database("Failed to list tables"))?
        .rows
        .iter()
        .map(|row| row.text("table_name"))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::database("Failed to list tables"))?;

    Ok(Json(json!({
        "type": state.db.kind().as_str(),
        "connection": "OK",
        "test_result": test,
        "tables": tables,
        "config": describe(&state.config.database),
        "live_subscribers": state.hub.subscriber_count(),
    })))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::PostgresConfig;

    #[test]
    fn describe_never_leaks_secrets() {
        let pg = DatabaseConfig::Postgres(PostgresConfig {
            host: "db.internal".into(),
            port: 5432,
            user: "panel".into(),
            password: Some("hunter2".to_string().into()),
            database: "panel".into(),
            ssl: true,
            max_connections: 10,
        });
        let described = describe(&pg);
        assert_eq!(described["password"], "SET");
        assert!(!described.to_string().contains("hunter2"));

        let turso = DatabaseConfig::Turso {
            url: "libsql://x.turso.io".into(),
            auth_token: "tok-secret".to_string().into(),
        };
        assert!(!describe(&turso).to_string().contains("tok-secret"));

        let sqlite = DatabaseConfig::Sqlite {
            path: PathBuf::from("./conversations.db"),
        };
        assert_eq!(describe(&sqlite)["path"], "./conversations.db");
    }
}
