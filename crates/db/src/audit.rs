//! Audit sink that appends to the `audit_records` table.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use uuid::Uuid;

use fundctl_core::audit::{AuditRecord, AuditSink};
use fundctl_core::store::StoreError;

use crate::convert::store_err;
use crate::entities::audit_records;

/// Persists audit records in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    db: DatabaseConnection,
}

impl PgAuditSink {
    /// Creates a sink over an open connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists the stored records for one entity, oldest first.
    pub async fn entity_history(
        &self,
        entity_id: Uuid,
    ) -> Result<Vec<audit_records::Model>, StoreError> {
        audit_records::Entity::find()
            .filter(audit_records::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_records::Column::OccurredAt)
            .all(&self.db)
            .await
            .map_err(store_err)
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        audit_records::ActiveModel::from(record)
            .insert(&self.db)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
