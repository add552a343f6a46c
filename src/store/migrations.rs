//! Schema initialisation: create-if-not-exists for every table and index.
//!
//! There is no version tracking: the DDL for the active dialect is simply
//! re-issued on every start, which is a no-op once the tables exist.

use tracing::info;

use super::traits::Database;
use crate::error::DatabaseError;

/// Ensure all tables and indexes exist for the adapter's dialect.
pub async fn init_schema(db: &dyn Database) -> Result<(), DatabaseError> {
    info!(backend = %db.kind(), "Initializing database schema");

    for statement in db.dialect().schema() {
        db.execute(statement, Vec::new())
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    }

    info!("Database schema ready");
    Ok(())
}
