//! ConversationStore: the `conversations` table of inbound/outbound messages.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::value::{Row, double_option, non_null};
use super::{Database, Page, SqlBuilder, inserted_id};
use crate::error::DatabaseError;

/// Name stored when a webhook does not say who the sender is.
pub const UNKNOWN_CONTACT_NAME: &str = "Unknown";

/// Initial delivery status of every message.
pub const DEFAULT_STATUS: &str = "pending";

/// Whether a message came in or went out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    #[default]
    Received,
    Sent,
}

impl MessageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Sent => "sent",
        }
    }
}

impl fmt::Display for MessageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(Self::Received),
            "sent" => Ok(Self::Sent),
            other => Err(format!("unknown message direction '{other}'")),
        }
    }
}

/// A persisted conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub phone_number: String,
    pub contact_name: Option<String>,
    pub message: String,
    pub message_type: MessageDirection,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub metadata: serde_json::Value,
}

impl Message {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        let direction = row.text("message_type")?;
        Ok(Self {
            id: row.integer("id")?,
            phone_number: row.text("phone_number")?,
            contact_name: row.opt_text("contact_name")?,
            message: row.text("message")?,
            message_type: direction
                .parse::<MessageDirection>()
                .map_err(|e: String| DatabaseError::decode("message_type", e))?,
            timestamp: row.timestamp("timestamp")?,
            status: row.text("status")?,
            metadata: row.json("metadata")?,
        })
    }
}

/// A validated message about to be inserted.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub phone_number: String,
    pub contact_name: Option<String>,
    pub message: String,
    pub message_type: MessageDirection,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update of a message. Absent fields are left untouched; `null`
/// clears `contact_name`, resets `metadata` to `{}`, and is rejected for the
/// rest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePatch {
    #[serde(default, deserialize_with = "double_option")]
    pub contact_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "non_null")]
    pub message_type: Option<MessageDirection>,
    #[serde(default, deserialize_with = "non_null")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub metadata: Option<Option<serde_json::Value>>,
}

impl MessagePatch {
    pub fn is_empty(&self) -> bool {
        self.contact_name.is_none()
            && self.message.is_none()
            && self.message_type.is_none()
            && self.status.is_none()
            && self.metadata.is_none()
    }
}

/// Dashboard counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationStats {
    pub total_messages: i64,
    pub total_contacts: i64,
    pub messages_today: i64,
    pub pending_messages: i64,
}

/// Newest first; `id` breaks ties between messages stored in the same instant.
const ORDER_NEWEST: &str = "timestamp DESC, id DESC";

/// Message storage over any backend.
#[derive(Clone)]
pub struct ConversationStore {
    db: Arc<dyn Database>,
}

impl ConversationStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// List messages, optionally for one phone number.
    pub async fn list(
        &self,
        phone_number: Option<&str>,
        page: Page,
    ) -> Result<Vec<Message>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "SELECT * FROM conversations");
        let mut conditions = Vec::new();
        if let Some(phone) = phone_number {
            conditions.push(format!("phone_number = {}", q.bind(phone)));
        }
        q.push_where(&conditions)
            .paginate(ORDER_NEWEST, page.limit, page.offset);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.rows.iter().map(Message::from_row).collect()
    }

    pub async fn get(&self, id: i64) -> Result<Option<Message>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "SELECT * FROM conversations WHERE id = ");
        let p = q.bind(id);
        q.push(&p);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.first().map(Message::from_row).transpose()
    }

    /// Insert a message stamped with `at`; returns the stored row.
    pub async fn insert(&self, new: &NewMessage, at: DateTime<Utc>) -> Result<Message, DatabaseError> {
        let sql = self.db.dialect().insert_returning_id(
            "conversations",
            &[
                "phone_number",
                "contact_name",
                "message",
                "message_type",
                "timestamp",
                "status",
                "metadata",
            ],
        );
        let metadata = new
            .metadata
            .clone()
            .unwrap_or_else(|| serde_json::json!({}));
        let result = self
            .db
            .execute(
                &sql,
                vec![
                    new.phone_number.clone().into(),
                    new.contact_name
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_CONTACT_NAME.to_string())
                        .into(),
                    new.message.clone().into(),
                    new.message_type.as_str().into(),
                    at.into(),
                    DEFAULT_STATUS.into(),
                    metadata.into(),
                ],
            )
            .await?;

        let id = inserted_id(&result)?;
        debug!(id, phone = %new.phone_number, "Message stored");
        self.get(id)
            .await?
            .ok_or_else(|| DatabaseError::Query(format!("message {id} vanished after insert")))
    }

    /// Apply a partial update. `Ok(None)` when no row has this id.
    pub async fn update(&self, id: i64, patch: &MessagePatch) -> Result<Option<Message>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "UPDATE conversations SET ");
        let mut sets = Vec::new();
        if let Some(name) = &patch.contact_name {
            sets.push(format!("contact_name = {}", q.bind(name.clone())));
        }
        if let Some(message) = &patch.message {
            sets.push(format!("message = {}", q.bind(message.clone())));
        }
        if let Some(direction) = patch.message_type {
            sets.push(format!("message_type = {}", q.bind(direction.as_str())));
        }
        if let Some(status) = &patch.status {
            sets.push(format!("status = {}", q.bind(status.clone())));
        }
        if let Some(metadata) = &patch.metadata {
            let metadata = metadata.clone().unwrap_or_else(|| serde_json::json!({}));
            sets.push(format!("metadata = {}", q.bind(metadata)));
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

    /// Change only the delivery status. Returns `false` when no row has this id.
    pub async fn set_status(&self, id: i64, status: &str) -> Result<bool, DatabaseError> {
        let patch = MessagePatch {
            status: Some(status.to_string()),
            ..Default::default()
        };
        Ok(self.update(id, &patch).await?.is_some())
    }

    /// Returns `false` when no row has this id.
    pub async fn delete(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "DELETE FROM conversations WHERE id = ");
        let p = q.bind(id);
        q.push(&p);

        let (sql, params) = q.build();
        Ok(self.db.execute(&sql, params).await?.row_count > 0)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        self.db
            .execute("SELECT COUNT(*) AS count FROM conversations", Vec::new())
            .await?
            .count("count")
    }

    pub async fn stats(&self) -> Result<ConversationStats, DatabaseError> {
        let dialect = self.db.dialect();

        let total_messages = self.count().await?;
        let total_contacts = self
            .db
            .execute("SELECT COUNT(*) AS count FROM contacts", Vec::new())
            .await?
            .count("count")?;
        let messages_today = self
            .db
            .execute(
                &format!(
                    "SELECT COUNT(*) AS count FROM conversations WHERE {}",
                    dialect.is_today("timestamp")
                ),
                Vec::new(),
            )
            .await?
            .count("count")?;

        let mut q = SqlBuilder::new(dialect, "SELECT COUNT(*) AS count FROM conversations");
        let conditions = [
            format!("message_type = {}", q.bind(MessageDirection::Received.as_str())),
            format!("status = {}", q.bind(DEFAULT_STATUS)),
        ];
        q.push_where(&conditions);
        let (sql, params) = q.build();
        let pending_messages = self.db.execute(&sql, params).await?.count("count")?;

        Ok(ConversationStats {
            total_messages,
            total_contacts,
            messages_today,
            pending_messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::memory_db;

    fn new_message(phone: &str, body: &str) -> NewMessage {
        NewMessage {
            phone_number: phone.to_string(),
            contact_name: Some("Alice".to_string()),
            message: body.to_string(),
            message_type: MessageDirection::Received,
            metadata: Some(serde_json::json!({"source": "test"})),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let store = ConversationStore::new(memory_db().await);
        let stored = store
            .insert(&new_message("+1555", "hello"), Utc::now())
            .await
            .unwrap();

        assert_eq!(stored.phone_number, "+1555");
        assert_eq!(stored.contact_name.as_deref(), Some("Alice"));
        assert_eq!(stored.message, "hello");
        assert_eq!(stored.status, DEFAULT_STATUS);
        assert_eq!(stored.metadata["source"], "test");

        let fetched = store.get(stored.id).await.unwrap().unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn insert_applies_defaults() {
        let store = ConversationStore::new(memory_db().await);
        let new = NewMessage {
            contact_name: None,
            metadata: None,
            ..new_message("+1555", "hi")
        };
        let stored = store.insert(&new, Utc::now()).await.unwrap();
        assert_eq!(stored.contact_name.as_deref(), Some(UNKNOWN_CONTACT_NAME));
        assert_eq!(stored.metadata, serde_json::json!({}));
        assert_eq!(stored.message_type, MessageDirection::Received);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let store = ConversationStore::new(memory_db().await);
        let base = Utc::now();
        for i in 0..150 {
            store
                .insert(&new_message("+1555", &format!("m{i}")), base + Duration::seconds(i))
                .await
                .unwrap();
        }

        let first = store
            .list(None, Page { limit: 100, offset: 0 })
            .await
            .unwrap();
        assert_eq!(first.len(), 100);
        assert_eq!(first[0].message, "m149");
        assert!(first.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let rest = store
            .list(None, Page { limit: 100, offset: 100 })
            .await
            .unwrap();
        assert_eq!(rest.len(), 50);
        assert_eq!(rest.last().unwrap().message, "m0");
    }

    #[tokio::test]
    async fn list_filters_by_phone() {
        let store = ConversationStore::new(memory_db().await);
        store.insert(&new_message("+1", "a"), Utc::now()).await.unwrap();
        store.insert(&new_message("+2", "b"), Utc::now()).await.unwrap();

        let only = store.list(Some("+2"), Page::default()).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].message, "b");
        assert!(store.list(Some("+3"), Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let store = ConversationStore::new(memory_db().await);
        let stored = store.insert(&new_message("+1", "a"), Utc::now()).await.unwrap();

        let patch = MessagePatch {
            status: Some("read".into()),
            ..Default::default()
        };
        let updated = store.update(stored.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.status, "read");
        assert_eq!(updated.message, stored.message);
        assert_eq!(updated.timestamp, stored.timestamp);

        assert!(store.update(9999, &patch).await.unwrap().is_none());
        assert!(!store.set_status(9999, "read").await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let store = ConversationStore::new(memory_db().await);
        let stored = store.insert(&new_message("+1", "a"), Utc::now()).await.unwrap();

        assert!(!store.delete(stored.id + 1).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.delete(stored.id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stats_count_today_and_pending() {
        let store = ConversationStore::new(memory_db().await);
        let today = store.insert(&new_message("+1", "a"), Utc::now()).await.unwrap();
        store
            .insert(&new_message("+1", "b"), Utc::now() - Duration::days(3))
            .await
            .unwrap();
        store.set_status(today.id, "read").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.total_contacts, 0);
        assert_eq!(stats.messages_today, 1);
        assert_eq!(stats.pending_messages, 1);
    }

    #[tokio::test]
    async fn null_metadata_resets_to_empty_object() {
        let store = ConversationStore::new(memory_db().await);
        let mut new = new_message("+1", "a");
        new.metadata = Some(serde_json::json!({"k": 1}));
        let stored = store.insert(&new, Utc::now()).await.unwrap();

        let patch: MessagePatch = serde_json::from_str(r#"{"metadata": null}"#).unwrap();
        assert!(!patch.is_empty());
        let updated = store.update(stored.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.metadata, serde_json::json!({}));

        assert!(serde_json::from_str::<MessagePatch>(r#"{"status": null}"#).is_err());
    }

    #[test]
    fn empty_patch_detected() {
        assert!(MessagePatch::default().is_empty());
        let patch: MessagePatch = serde_json::from_str(r#"{"contact_name": null}"#).unwrap();
        assert_eq!(patch.contact_name, Some(None));
        assert!(!patch.is_empty());
        let unknown: MessagePatch = serde_json::from_str(r#"{"color": "red"}"#).unwrap();
        assert!(unknown.is_empty());
    }
}
