//! Audit trail for fund control state transitions.
//!
//! Every committed transition produces an [`AuditRecord`]. The services
//! hand records to an [`AuditSink`] before acknowledging success, but a
//! failing sink never changes the outcome of the operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundctl_shared::types::{AuditRecordId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::store::StoreError;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Fiscal year created.
    FiscalYearCreated,
    /// Fiscal year status changed.
    FiscalYearTransitioned,
    /// Appropriation created.
    AppropriationCreated,
    /// Funds reserved directly on the fiscal ledger.
    FundsReserved,
    /// Funds released directly on the fiscal ledger.
    FundsReleased,
    /// Obligation recorded.
    ObligationCreated,
    /// Obligation dated outside its fiscal year on a justified override.
    BonaFideNeedOverride,
    /// Obligation cancelled.
    ObligationCancelled,
    /// Expenditure posted.
    ExpenditurePosted,
    /// Budget created.
    BudgetCreated,
    /// Draft version edited in place.
    DraftUpdated,
    /// Pending version created.
    VersionCreated,
    /// Version committed as current.
    VersionCommitted,
    /// Version rolled back.
    VersionRolledBack,
    /// Workflow template registered.
    WorkflowRegistered,
    /// Request submitted or resubmitted.
    ApprovalSubmitted,
    /// Level approved, by a person or automatically.
    ApprovalApproved,
    /// Request rejected.
    ApprovalRejected,
    /// Request returned to the submitter.
    ApprovalReturned,
    /// Pending level delegated.
    ApprovalDelegated,
}

impl AuditAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiscalYearCreated => "fiscal_year_created",
            Self::FiscalYearTransitioned => "fiscal_year_transitioned",
            Self::AppropriationCreated => "appropriation_created",
            Self::FundsReserved => "funds_reserved",
            Self::FundsReleased => "funds_released",
            Self::ObligationCreated => "obligation_created",
            Self::BonaFideNeedOverride => "bona_fide_need_override",
            Self::ObligationCancelled => "obligation_cancelled",
            Self::ExpenditurePosted => "expenditure_posted",
            Self::BudgetCreated => "budget_created",
            Self::DraftUpdated => "draft_updated",
            Self::VersionCreated => "version_created",
            Self::VersionCommitted => "version_committed",
            Self::VersionRolledBack => "version_rolled_back",
            Self::WorkflowRegistered => "workflow_registered",
            Self::ApprovalSubmitted => "approval_submitted",
            Self::ApprovalApproved => "approval_approved",
            Self::ApprovalRejected => "approval_rejected",
            Self::ApprovalReturned => "approval_returned",
            Self::ApprovalDelegated => "approval_delegated",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of entity an audit record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntity {
    /// Fiscal year.
    FiscalYear,
    /// Appropriation.
    Appropriation,
    /// Budget.
    Budget,
    /// Obligation.
    Obligation,
    /// Expenditure.
    Expenditure,
    /// Approval workflow template.
    ApprovalWorkflow,
    /// Approval request.
    ApprovalRequest,
}

impl AuditEntity {
    /// Returns the string representation of the entity type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiscalYear => "fiscal_year",
            Self::Appropriation => "appropriation",
            Self::Budget => "budget",
            Self::Obligation => "obligation",
            Self::Expenditure => "expenditure",
            Self::ApprovalWorkflow => "approval_workflow",
            Self::ApprovalRequest => "approval_request",
        }
    }
}

impl fmt::Display for AuditEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique identifier.
    pub id: AuditRecordId,
    /// Who caused the transition; `None` for automatic actions.
    pub actor: Option<UserId>,
    /// What happened.
    pub action: AuditAction,
    /// Entity type.
    pub entity_type: AuditEntity,
    /// Entity identifier.
    pub entity_id: Uuid,
    /// Snapshot before the transition.
    pub before: Option<serde_json::Value>,
    /// Snapshot after the transition.
    pub after: Option<serde_json::Value>,
    /// When it happened.
    pub occurred_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a record with no snapshots.
    pub fn new(
        actor: Option<UserId>,
        action: AuditAction,
        entity_type: AuditEntity,
        entity_id: impl Into<Uuid>,
    ) -> Self {
        Self {
            id: AuditRecordId::new(),
            actor,
            action,
            entity_type,
            entity_id: entity_id.into(),
            before: None,
            after: None,
            occurred_at: Utc::now(),
        }
    }

    /// Attaches the state before the transition.
    #[must_use]
    pub fn with_before<T: Serialize>(mut self, value: &T) -> Self {
        self.before = serde_json::to_value(value).ok();
        self
    }

    /// Attaches the state after the transition.
    #[must_use]
    pub fn with_after<T: Serialize>(mut self, value: &T) -> Self {
        self.after = serde_json::to_value(value).ok();
        self
    }
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persists one record.
    async fn record(&self, record: &AuditRecord) -> Result<(), StoreError>;
}

/// Writes audit records to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        tracing::info!(
            target: "fundctl::audit",
            audit_id = %record.id,
            actor = ?record.actor,
            action = %record.action,
            entity_type = %record.entity_type,
            entity_id = %record.entity_id,
            "audit"
        );
        Ok(())
    }
}

/// Keeps audit records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record received so far.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }

    /// Returns the records for one action.
    pub async fn records_for(&self, action: AuditAction) -> Vec<AuditRecord> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundctl_shared::types::ObligationId;

    #[tokio::test]
    async fn test_memory_sink_collects_records() {
        let sink = MemoryAuditSink::new();
        let obligation_id = ObligationId::new();
        let actor = UserId::new();

        let record = AuditRecord::new(
            Some(actor),
            AuditAction::ObligationCreated,
            AuditEntity::Obligation,
            obligation_id,
        )
        .with_after(&serde_json::json!({ "amount": "100.00" }));
        sink.record(&record).await.unwrap();

        let records = sink.records_for(AuditAction::ObligationCreated).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity_id, obligation_id.into_inner());
        assert_eq!(records[0].actor, Some(actor));
        assert!(records[0].before.is_none());
        assert_eq!(records[0].after.as_ref().unwrap()["amount"], "100.00");
        assert!(sink.records_for(AuditAction::ObligationCancelled).await.is_empty());
    }

    #[test]
    fn test_action_names() {
        assert_eq!(AuditAction::VersionRolledBack.as_str(), "version_rolled_back");
        assert_eq!(AuditEntity::ApprovalRequest.to_string(), "approval_request");
    }
}
