//! ContactStore: one row per phone number, upserted on every message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::value::{Row, double_option, non_null};
use super::{Database, Page, SqlBuilder};
use crate::error::DatabaseError;

/// Status given to contacts created without one.
pub const DEFAULT_CONTACT_STATUS: &str = "active";

/// A persisted contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub phone_number: String,
    pub name: Option<String>,
    pub last_interaction: Option<DateTime<Utc>>,
    pub total_messages: i64,
    pub status: String,
}

impl Contact {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: row.integer("id")?,
            phone_number: row.text("phone_number")?,
            name: row.opt_text("name")?,
            last_interaction: row.opt_timestamp("last_interaction")?,
            total_messages: row.integer("total_messages")?,
            status: row.text("status")?,
        })
    }
}

/// A contact created by hand rather than by an incoming message.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub phone_number: String,
    pub name: Option<String>,
    pub status: Option<String>,
}

/// Editable contact fields. The message counter is not among them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub status: Option<String>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none()
    }
}

/// List filters.
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    /// Case-insensitive partial match on name or phone number.
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactStats {
    pub total: i64,
    pub active: i64,
    pub interacted_today: i64,
}

/// Contact storage over any backend.
#[derive(Clone)]
pub struct ContactStore {
    db: Arc<dyn Database>,
}

impl ContactStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Most recently active first; contacts never messaged sort last.
    pub async fn list(&self, filter: &ContactFilter, page: Page) -> Result<Vec<Contact>, DatabaseError> {
        let dialect = self.db.dialect();
        let mut q = SqlBuilder::new(dialect, "SELECT * FROM contacts");
        let mut conditions = Vec::new();
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            let a = q.bind(pattern.clone());
            let b = q.bind(pattern);
            conditions.push(format!(
                "(name {op} {a} OR phone_number {op} {b})",
                op = dialect.ilike()
            ));
        }
        if let Some(status) = &filter.status {
            conditions.push(format!("status = {}", q.bind(status.clone())));
        }
        q.push_where(&conditions).paginate(
            "last_interaction DESC NULLS LAST, id DESC",
            page.limit,
            page.offset,
        );

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.rows.iter().map(Contact::from_row).collect()
    }

    pub async fn get(&self, phone_number: &str) -> Result<Option<Contact>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "SELECT * FROM contacts WHERE phone_number = ");
        let p = q.bind(phone_number);
        q.push(&p);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.first().map(Contact::from_row).transpose()
    }

    /// Insert a contact with no messages yet. A duplicate phone number is a
    /// constraint violation reported by the backend.
    pub async fn create(&self, new: &NewContact) -> Result<Contact, DatabaseError> {
        let sql = self
            .db
            .dialect()
            .insert("contacts", &["phone_number", "name", "status", "total_messages"]);
        self.db
            .execute(
                &sql,
                vec![
                    new.phone_number.clone().into(),
                    new.name.clone().into(),
                    new.status
                        .clone()
                        .unwrap_or_else(|| DEFAULT_CONTACT_STATUS.to_string())
                        .into(),
                    0i64.into(),
                ],
            )
            .await?;

        self.get(&new.phone_number).await?.ok_or_else(|| {
            DatabaseError::Query(format!("contact {} vanished after insert", new.phone_number))
        })
    }

    /// Record one message for `phone_number`: create the contact with a count
    /// of one, or bump the stored count and interaction time.
    ///
    /// `name` always replaces the stored name, so the contact carries the
    /// name of its latest message.
    pub async fn record_interaction(
        &self,
        phone_number: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let sql = self.db.dialect().upsert(
            "contacts",
            &["phone_number", "name", "last_interaction", "total_messages"],
            "phone_number",
            &[
                "name = excluded.name",
                "last_interaction = excluded.last_interaction",
                "total_messages = contacts.total_messages + 1",
            ],
        );
        self.db
            .execute(
                &sql,
                vec![phone_number.into(), name.into(), at.into(), 1i64.into()],
            )
            .await?;
        debug!(phone = %phone_number, "Contact interaction recorded");
        Ok(())
    }

    /// Apply a partial update. `Ok(None)` when the contact does not exist.
    pub async fn update(
        &self,
        phone_number: &str,
        patch: &ContactPatch,
    ) -> Result<Option<Contact>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "UPDATE contacts SET ");
        let mut sets = Vec::new();
        if let Some(name) = &patch.name {
            sets.push(format!("name = {}", q.bind(name.clone())));
        }
        if let Some(status) = &patch.status {
            sets.push(format!("status = {}", q.bind(status.clone())));
        }
        if sets.is_empty() {
            return self.get(phone_number).await;
        }
        let p = q.bind(phone_number);
        q.push(&sets.join(", "))
            .push(&format!(" WHERE phone_number = {p}"));

        let (sql, params) = q.build();
        if self.db.execute(&sql, params).await?.row_count == 0 {
            return Ok(None);
        }
        self.get(phone_number).await
    }

    pub async fn delete(&self, phone_number: &str) -> Result<bool, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "DELETE FROM contacts WHERE phone_number = ");
        let p = q.bind(phone_number);
        q.push(&p);

        let (sql, params) = q.build();
        Ok(self.db.execute(&sql, params).await?.row_count > 0)
    }

    pub async fn stats(&self) -> Result<ContactStats, DatabaseError> {
        let dialect = self.db.dialect();
        let total = self
            .db
            .execute("SELECT COUNT(*) AS count FROM contacts", Vec::new())
            .await?
            .count("count")?;

        let mut q = SqlBuilder::new(dialect, "SELECT COUNT(*) AS count FROM contacts WHERE status = ");
        let p = q.bind(DEFAULT_CONTACT_STATUS);
        q.push(&p);
        let (sql, params) = q.build();
        let active = self.db.execute(&sql, params).await?.count("count")?;

        let interacted_today = self
            .db
            .execute(
                &format!(
                    "SELECT COUNT(*) AS count FROM contacts WHERE {}",
                    dialect.is_today("last_interaction")
                ),
                Vec::new(),
            )
            .await?
            .count("count")?;

        Ok(ContactStats {
            total,
            active,
            interacted_today,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::memory_db;

    fn new_contact(phone: &str, name: &str) -> NewContact {
        NewContact {
            phone_number: phone.to_string(),
            name: Some(name.to_string()),
            status: None,
        }
    }

    #[tokio::test]
    async fn repeated_interactions_upsert_one_row() {
        let store = ContactStore::new(memory_db().await);
        let first = Utc::now() - Duration::minutes(5);
        let second = Utc::now();

        store.record_interaction("+1555", "Ana", first).await.unwrap();
        store.record_interaction("+1555", "Ana Maria", second).await.unwrap();

        let all = store.list(&ContactFilter::default(), Page::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        let contact = &all[0];
        assert_eq!(contact.total_messages, 2);
        assert_eq!(contact.name.as_deref(), Some("Ana Maria"));
        assert_eq!(
            contact.last_interaction.unwrap().timestamp_millis(),
            second.timestamp_millis()
        );
        assert_eq!(contact.status, DEFAULT_CONTACT_STATUS);
    }

    #[tokio::test]
    async fn created_contact_starts_at_zero() {
        let store = ContactStore::new(memory_db().await);
        let created = store.create(&new_contact("+1", "Bia")).await.unwrap();
        assert_eq!(created.total_messages, 0);
        assert!(created.last_interaction.is_none());

        store.record_interaction("+1", "Bia", Utc::now()).await.unwrap();
        assert_eq!(store.get("+1").await.unwrap().unwrap().total_messages, 1);
    }

    #[tokio::test]
    async fn duplicate_create_is_a_backend_error() {
        let store = ContactStore::new(memory_db().await);
        store.create(&new_contact("+1", "A")).await.unwrap();
        assert!(store.create(&new_contact("+1", "B")).await.is_err());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_partial() {
        let store = ContactStore::new(memory_db().await);
        store.create(&new_contact("+1", "Maria Silva")).await.unwrap();
        store.create(&new_contact("+2", "Joao")).await.unwrap();

        let filter = ContactFilter {
            search: Some("silv".into()),
            ..Default::default()
        };
        let found = store.list(&filter, Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].phone_number, "+1");
    }

    #[tokio::test]
    async fn never_messaged_contacts_sort_last() {
        let store = ContactStore::new(memory_db().await);
        store.create(&new_contact("+1", "Quiet")).await.unwrap();
        store.record_interaction("+2", "Chatty", Utc::now()).await.unwrap();

        let all = store.list(&ContactFilter::default(), Page::default()).await.unwrap();
        assert_eq!(all[0].phone_number, "+2");
        assert_eq!(all[1].phone_number, "+1");
    }

    #[tokio::test]
    async fn update_and_delete_missing_contact() {
        let store = ContactStore::new(memory_db().await);
        let patch = ContactPatch {
            status: Some("blocked".into()),
            ..Default::default()
        };
        assert!(store.update("+9", &patch).await.unwrap().is_none());
        assert!(!store.delete("+9").await.unwrap());

        store.create(&new_contact("+9", "Z")).await.unwrap();
        let updated = store.update("+9", &patch).await.unwrap().unwrap();
        assert_eq!(updated.status, "blocked");
        assert_eq!(updated.name.as_deref(), Some("Z"));
        assert!(store.delete("+9").await.unwrap());
    }

    #[tokio::test]
    async fn stats_counts_active_and_today() {
        let store = ContactStore::new(memory_db().await);
        store.record_interaction("+1", "One", Utc::now()).await.unwrap();
        store
            .record_interaction("+2", "Two", Utc::now() - Duration::days(2))
            .await
            .unwrap();
        store
            .update(
                "+2",
                &ContactPatch {
                    status: Some("archived".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            ContactStats {
                total: 2,
                active: 1,
                interacted_today: 1
            }
        );
    }
}
