//! ChatStore: free-form JSON chat entries grouped by session id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value::{Row, non_null};
use super::{Database, Page, SqlBuilder, inserted_id};
use crate::error::DatabaseError;

/// Default number of sessions returned by [`ChatStore::sessions`].
pub const DEFAULT_SESSION_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub session_id: String,
    pub message: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: row.integer("id")?,
            session_id: row.text("session_id")?,
            message: row.json("message")?,
            created_at: row.timestamp("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatPatch {
    #[serde(default, deserialize_with = "non_null")]
    pub session_id: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub message: Option<serde_json::Value>,
}

impl ChatPatch {
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.message.is_none()
    }
}

/// One row of the per-session overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub message_count: i64,
    /// Creation time of the newest chat in the session.
    pub last_message: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatStats {
    pub total_mensagens: i64,
    pub total_sessoes: i64,
    pub mensagens_hoje: i64,
}

const ORDER_NEWEST: &str = "created_at DESC, id DESC";

#[derive(Clone)]
pub struct ChatStore {
    db: Arc<dyn Database>,
}

impl ChatStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Newest first, optionally restricted to one session.
    pub async fn list(&self, session_id: Option<&str>, page: Page) -> Result<Vec<Chat>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "SELECT * FROM chats");
        let mut conditions = Vec::new();
        if let Some(session) = session_id {
            conditions.push(format!("session_id = {}", q.bind(session)));
        }
        q.push_where(&conditions)
            .paginate(ORDER_NEWEST, page.limit, page.offset);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.rows.iter().map(Chat::from_row).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<Chat>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "SELECT * FROM chats WHERE id = ");
        let p = q.bind(id);
        q.push(&p);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.first().map(Chat::from_row).transpose()
    }

    pub async fn create(
        &self,
        session_id: &str,
        message: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Result<Chat, DatabaseError> {
        let sql = self
            .db
            .dialect()
            .insert_returning_id("chats", &["session_id", "message", "created_at"]);
        let result = self
            .db
            .execute(&sql, vec![session_id.into(), message.into(), at.into()])
            .await?;

        let id = inserted_id(&result)?;
        self.get(id)
            .await?
            .ok_or_else(|| DatabaseError::Query(format!("chat {id} vanished after insert")))
    }

    pub async fn update(&self, id: i64, patch: &ChatPatch) -> Result<Option<Chat>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "UPDATE chats SET ");
        let mut sets = Vec::new();
        if let Some(session) = &patch.session_id {
            sets.push(format!("session_id = {}", q.bind(session.clone())));
        }
        if let Some(message) = &patch.message {
            sets.push(format!("message = {}", q.bind(message.clone())));
        }
        if sets.is_empty() {
            return self.get(id).await;
        }
        let p = q.bind(id);
        q.push(&sets.join(", ")).push(&format!(" WHERE id = {p}"));

        let (sql, params) = q.build();
        if self.db.execute(&sql, params).await?.row_count == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "DELETE FROM chats WHERE id = ");
        let p = q.bind(id);
        q.push(&p);

        let (sql, params) = q.build();
        Ok(self.db.execute(&sql, params).await?.row_count > 0)
    }

    /// Sessions ordered by their most recent chat.
    pub async fn sessions(&self, limit: u32) -> Result<Vec<SessionSummary>, DatabaseError> {
        let mut q = SqlBuilder::new(
            self.db.dialect(),
            "SELECT session_id, COUNT(*) AS message_count, MAX(created_at) AS last_message \
             FROM chats GROUP BY session_id ORDER BY last_message DESC LIMIT ",
        );
        let p = q.bind(limit);
        q.push(&p);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result
            .rows
            .iter()
            .map(|row| {
                Ok(SessionSummary {
                    session_id: row.text("session_id")?,
                    message_count: row.integer("message_count")?,
                    last_message: row.opt_timestamp("last_message")?,
                })
            })
            .collect()
    }

    pub async fn stats(&self) -> Result<ChatStats, DatabaseError> {
        let total_mensagens = self
            .db
            .execute("SELECT COUNT(*) AS count FROM chats", Vec::new())
            .await?
            .count("count")?;
        let total_sessoes = self
            .db
            .execute("SELECT COUNT(DISTINCT session_id) AS count FROM chats", Vec::new())
            .await?
            .count("count")?;
        let mensagens_hoje = self
            .db
            .execute(
                &format!(
                    "SELECT COUNT(*) AS count FROM chats WHERE {}",
                    self.db.dialect().is_today("created_at")
                ),
                Vec::new(),
            )
            .await?
            .count("count")?;

        Ok(ChatStats {
            total_mensagens,
            total_sessoes,
            mensagens_hoje,
        })
    }
}
