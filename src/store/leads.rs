//! LeadStore: follow-up leads keyed by UUID.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::{Row, double_option, non_null};
use super::{Database, Page, SqlBuilder};
use crate::error::DatabaseError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub numero: String,
    pub nome: Option<String>,
    pub followupsequencia: Option<String>,
    pub followupsequenciamsgid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub trava: bool,
}

impl Lead {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: row.uuid("id")?,
            numero: row.text("numero")?,
            nome: row.opt_text("nome")?,
            followupsequencia: row.opt_text("followupsequencia")?,
            followupsequenciamsgid: row.opt_text("followupsequenciamsgid")?,
            created_at: row.timestamp("created_at")?,
            trava: row.boolean("trava")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLead {
    pub numero: String,
    pub nome: Option<String>,
    pub followupsequencia: Option<String>,
    pub followupsequenciamsgid: Option<String>,
    pub trava: bool,
}

/// Partial lead update; `null` clears a nullable column and is rejected for
/// `numero` and `trava`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadPatch {
    #[serde(default, deserialize_with = "non_null")]
    pub numero: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub nome: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub followupsequencia: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub followupsequenciamsgid: Option<Option<String>>,
    #[serde(default, deserialize_with = "non_null")]
    pub trava: Option<bool>,
}

impl LeadPatch {
    pub fn is_empty(&self) -> bool {
        self.numero.is_none()
            && self.nome.is_none()
            && self.followupsequencia.is_none()
            && self.followupsequenciamsgid.is_none()
            && self.trava.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub trava: Option<bool>,
    /// Case-insensitive partial match on `nome`.
    pub nome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadStats {
    pub total: i64,
    pub travados: i64,
    pub hoje: i64,
}

#[derive(Clone)]
pub struct LeadStore {
    db: Arc<dyn Database>,
}

impl LeadStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &LeadFilter, page: Page) -> Result<Vec<Lead>, DatabaseError> {
        let dialect = self.db.dialect();
        let mut q = SqlBuilder::new(dialect, "SELECT * FROM leads");
        let mut conditions = Vec::new();
        if let Some(trava) = filter.trava {
            conditions.push(format!("trava = {}", q.bind(trava)));
        }
        if let Some(nome) = &filter.nome {
            conditions.push(format!(
                "nome {} {}",
                dialect.ilike(),
                q.bind(format!("%{nome}%"))
            ));
        }
        q.push_where(&conditions)
            .paginate("created_at DESC", page.limit, page.offset);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.rows.iter().map(Lead::from_row).collect()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Lead>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "SELECT * FROM leads WHERE id = ");
        let p = q.bind(id);
        q.push(&p);

        let (sql, params) = q.build();
        let result = self.db.execute(&sql, params).await?;
        result.first().map(Lead::from_row).transpose()
    }

    /// Insert with an id generated here, so every backend stores the same
    /// kind of key.
    pub async fn create(&self, new: &NewLead, at: DateTime<Utc>) -> Result<Lead, DatabaseError> {
        let id = Uuid::new_v4();
        let sql = self.db.dialect().insert(
            "leads",
            &[
                "id",
                "numero",
                "nome",
                "followupsequencia",
                "followupsequenciamsgid",
                "created_at",
                "trava",
            ],
        );
        self.db
            .execute(
                &sql,
                vec![
                    id.into(),
                    new.numero.clone().into(),
                    new.nome.clone().into(),
                    new.followupsequencia.clone().into(),
                    new.followupsequenciamsgid.clone().into(),
                    at.into(),
                    new.trava.into(),
                ],
            )
            .await?;

        self.get(id)
            .await?
            .ok_or_else(|| DatabaseError::Query(format!("lead {id} vanished after insert")))
    }

    pub async fn update(&self, id: Uuid, patch: &LeadPatch) -> Result<Option<Lead>, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "UPDATE leads SET ");
        let mut sets = Vec::new();
        if let Some(numero) = &patch.numero {
            sets.push(format!("numero = {}", q.bind(numero.clone())));
        }
        if let Some(nome) = &patch.nome {
            sets.push(format!("nome = {}", q.bind(nome.clone())));
        }
        if let Some(seq) = &patch.followupsequencia {
            sets.push(format!("followupsequencia = {}", q.bind(seq.clone())));
        }
        if let Some(msg_id) = &patch.followupsequenciamsgid {
            sets.push(format!("followupsequenciamsgid = {}", q.bind(msg_id.clone())));
        }
        if let Some(trava) = patch.trava {
            sets.push(format!("trava = {}", q.bind(trava)));
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

    pub async fn delete(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut q = SqlBuilder::new(self.db.dialect(), "DELETE FROM leads WHERE id = ");
        let p = q.bind(id);
        q.push(&p);

        let (sql, params) = q.build();
        Ok(self.db.execute(&sql, params).await?.row_count > 0)
    }

    pub async fn stats(&self) -> Result<LeadStats, DatabaseError> {
        let dialect = self.db.dialect();
        let total = self
            .db
            .execute("SELECT COUNT(*) AS count FROM leads", Vec::new())
            .await?
            .count("count")?;

        let mut q = SqlBuilder::new(dialect, "SELECT COUNT(*) AS count FROM leads WHERE trava = ");
        let p = q.bind(true);
        q.push(&p);
        let (sql, params) = q.build();
        let travados = self.db.execute(&sql, params).await?.count("count")?;

        let hoje = self
            .db
            .execute(
                &format!(
                    "SELECT COUNT(*) AS count FROM leads WHERE {}",
                    dialect.is_today("created_at")
                ),
                Vec::new(),
            )
            .await?
            .count("count")?;

        Ok(LeadStats {
            total,
            travados,
            hoje,
        })
    }
}
