//! Approval workflow engine service.
//!
//! Loads a request, runs the state machine on a copy, and saves the copy
//! together with its budget effects in one revision-guarded store write.
//! Audit and notification happen only after the write succeeded.

use chrono::Utc;
use fundctl_shared::types::{ApprovalRequestId, ApprovalWorkflowId, BudgetId, UserId};
use std::sync::Arc;
use tracing::{info, instrument};

use super::engine::ApprovalEngine;
use super::error::WorkflowError;
use super::types::{
    ApprovalAction, ApprovalDecision, ApprovalRecord, ApprovalRequest, ApprovalStatus,
    ApprovalWorkflow,
};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::budget::{BudgetChanges, BudgetStatus, BudgetVersion, BudgetVersionStore, VersionError};
use crate::collaborators::Collaborators;
use crate::notify::{ApprovalNotification, NotificationKind};
use crate::store::{ApprovalUpdate, ApprovalWrite, FundControlStore, VersionCommit};

/// Drives budgets through their approval workflow.
pub struct ApprovalWorkflowEngine<S> {
    store: Arc<S>,
    versions: BudgetVersionStore<S>,
    collaborators: Collaborators,
}

impl<S> Clone for ApprovalWorkflowEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            versions: self.versions.clone(),
            collaborators: self.collaborators.clone(),
        }
    }
}

impl<S: FundControlStore> ApprovalWorkflowEngine<S> {
    /// Creates an engine over `store`.
    pub fn new(store: Arc<S>, collaborators: Collaborators) -> Self {
        Self {
            versions: BudgetVersionStore::new(Arc::clone(&store), collaborators.clone()),
            store,
            collaborators,
        }
    }

    /// Validates and stores a workflow template.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` when validation fails.
    pub async fn register_workflow(
        &self,
        workflow: ApprovalWorkflow,
        actor: Option<UserId>,
    ) -> Result<ApprovalWorkflow, WorkflowError> {
        workflow.validate()?;
        self.store.insert_workflow(&workflow).await?;
        info!(workflow_id = %workflow.id, levels = workflow.levels(), "workflow registered");

        self.collaborators
            .audit(
                AuditRecord::new(
                    actor,
                    AuditAction::WorkflowRegistered,
                    AuditEntity::ApprovalWorkflow,
                    workflow.id,
                )
                .with_after(&workflow),
            )
            .await;

        Ok(workflow)
    }

    /// Loads a workflow template.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowNotFound` if it does not exist.
    pub async fn workflow(&self, id: ApprovalWorkflowId) -> Result<ApprovalWorkflow, WorkflowError> {
        self.store
            .workflow(id)
            .await?
            .ok_or(WorkflowError::WorkflowNotFound(id))
    }

    /// Loads an approval request.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotFound` if it does not exist.
    pub async fn request(&self, id: ApprovalRequestId) -> Result<ApprovalRequest, WorkflowError> {
        self.store
            .approval_request(id)
            .await?
            .ok_or(WorkflowError::RequestNotFound(id))
    }

    /// Submits a budget for approval.
    ///
    /// The open pending version is put under review; when there is none,
    /// one is created from the current version. A returned request is
    /// resubmitted and restarts at level 1.
    ///
    /// # Errors
    ///
    /// Returns `NoWorkflowConfigured` when the budget has no template and
    /// `InvalidTransition` while another request is in flight.
    #[instrument(skip(self))]
    pub async fn submit(
        &self,
        budget_id: BudgetId,
        submitter: UserId,
    ) -> Result<ApprovalRequest, WorkflowError> {
        let budget = self
            .store
            .budget(budget_id)
            .await?
            .ok_or(WorkflowError::BudgetNotFound(budget_id))?;
        let workflow_id = budget
            .approval_workflow_id
            .ok_or(WorkflowError::NoWorkflowConfigured(budget_id))?;
        let workflow = self.workflow(workflow_id).await?;

        let existing = self.store.latest_budget_request(budget_id).await?;
        if let Some(open) = existing.as_ref().filter(|r| r.status.is_open()) {
            return Err(WorkflowError::InvalidTransition {
                from: open.status,
                action: "submit",
            });
        }

        let pending = match self.versions.open_pending(budget_id).await? {
            Some(pending) => pending,
            None => {
                self.versions
                    .create_pending_version(
                        budget_id,
                        budget.current_version,
                        BudgetChanges::default(),
                        submitter,
                    )
                    .await?
            }
        };

        let (mut request, expected_revision) = match existing {
            Some(returned) if returned.status == ApprovalStatus::Returned => {
                let revision = returned.revision;
                let mut request = returned;
                request.version = pending.number;
                request.amount = pending.total_amount;
                request.workflow_id = workflow.id;
                (request, Some(revision))
            }
            _ => (
                ApprovalRequest::new(
                    workflow.id,
                    budget_id,
                    pending.number,
                    pending.total_amount,
                    submitter,
                ),
                None,
            ),
        };
        let before = request.clone();

        ApprovalEngine::submit(&mut request, &workflow, submitter, Utc::now())?;
        self.save(before, request, expected_revision, &pending, submitter)
            .await
    }

    /// Applies an approver's decision to the pending level.
    ///
    /// Final approval commits the pending version; rejection discards it;
    /// return keeps it for the submitter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition`, `UnauthorizedApprover` or
    /// `ReasonRequired` from the state machine, and `ConcurrentUpdate` when
    /// another action on the same request won the race.
    #[instrument(skip(self, comments))]
    pub async fn process_step(
        &self,
        request_id: ApprovalRequestId,
        approver: UserId,
        decision: ApprovalDecision,
        comments: Option<String>,
    ) -> Result<ApprovalRequest, WorkflowError> {
        let before = self.request(request_id).await?;
        let workflow = self.workflow(before.workflow_id).await?;
        let roles = self.collaborators.roles(approver).await?;

        let mut request = before.clone();
        ApprovalEngine::process(
            &mut request,
            &workflow,
            approver,
            &roles,
            decision,
            comments,
            Utc::now(),
        )?;

        let pending = self
            .store
            .budget_version(request.budget_id, request.version)
            .await?
            .ok_or(VersionError::VersionNotFound {
                budget_id: request.budget_id,
                version: request.version,
            })?;
        let expected = Some(before.revision);
        self.save(before, request, expected, &pending, approver)
            .await
    }

    /// Reassigns the pending level to another approver.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when no level is pending,
    /// `UnauthorizedApprover` when `actor` cannot act on it, and
    /// `ConcurrentUpdate` on a lost race.
    #[instrument(skip(self))]
    pub async fn delegate(
        &self,
        request_id: ApprovalRequestId,
        actor: UserId,
        to: UserId,
    ) -> Result<ApprovalRequest, WorkflowError> {
        let before = self.request(request_id).await?;
        let workflow = self.workflow(before.workflow_id).await?;
        let roles = self.collaborators.roles(actor).await?;

        let mut request = before.clone();
        ApprovalEngine::delegate(&mut request, &workflow, actor, &roles, to, Utc::now())?;

        let pending = self
            .store
            .budget_version(request.budget_id, request.version)
            .await?
            .ok_or(VersionError::VersionNotFound {
                budget_id: request.budget_id,
                version: request.version,
            })?;
        let expected = Some(before.revision);
        self.save(before, request, expected, &pending, actor).await
    }

    /// Full action history of a request, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RequestNotFound` if it does not exist.
    pub async fn history(
        &self,
        request_id: ApprovalRequestId,
    ) -> Result<Vec<ApprovalRecord>, WorkflowError> {
        Ok(self.request(request_id).await?.records)
    }

    async fn save(
        &self,
        before: ApprovalRequest,
        mut request: ApprovalRequest,
        expected_revision: Option<u64>,
        pending: &BudgetVersion,
        actor: UserId,
    ) -> Result<ApprovalRequest, WorkflowError> {
        request.revision = expected_revision.map_or(0, |r| r + 1);

        let (budget_status, commit, discard_version) = match request.status {
            ApprovalStatus::Approved => (
                BudgetStatus::Approved,
                Some(VersionCommit {
                    version: pending.number,
                    expected_current: pending.previous.unwrap_or_default(),
                }),
                None,
            ),
            ApprovalStatus::Rejected => (BudgetStatus::Rejected, None, Some(pending.number)),
            ApprovalStatus::Returned => (BudgetStatus::Returned, None, None),
            ApprovalStatus::Draft | ApprovalStatus::Submitted | ApprovalStatus::UnderReview { .. } => {
                (BudgetStatus::UnderReview, None, None)
            }
        };

        let update = ApprovalUpdate {
            request: request.clone(),
            expected_revision,
            budget_status,
            commit,
            discard_version,
        };

        match self.store.save_approval(&update).await? {
            ApprovalWrite::Saved(_) => {}
            ApprovalWrite::RevisionConflict { .. } => {
                return Err(WorkflowError::ConcurrentUpdate(request.id));
            }
            ApprovalWrite::VersionConflict { expected, actual } => {
                return Err(VersionError::VersionConflict {
                    budget_id: request.budget_id,
                    expected,
                    actual,
                }
                .into());
            }
            ApprovalWrite::BudgetNotFound => {
                return Err(WorkflowError::BudgetNotFound(request.budget_id));
            }
            ApprovalWrite::VersionNotFound(version) => {
                return Err(VersionError::VersionNotFound {
                    budget_id: request.budget_id,
                    version,
                }
                .into());
            }
        }

        info!(
            request_id = %request.id,
            budget_id = %request.budget_id,
            status = %request.status,
            "approval request saved"
        );
        if let Some(commit) = commit {
            info!(budget_id = %request.budget_id, version = commit.version, "version committed");
        }

        self.publish(&before, &request, actor, commit).await;
        Ok(request)
    }

    /// Audits every new history entry and notifies on status changes.
    async fn publish(
        &self,
        before: &ApprovalRequest,
        after: &ApprovalRequest,
        actor: UserId,
        commit: Option<VersionCommit>,
    ) {
        for record in after.records.iter().skip(before.records.len()) {
            let action = match record.action {
                ApprovalAction::Submitted => AuditAction::ApprovalSubmitted,
                ApprovalAction::Approved => AuditAction::ApprovalApproved,
                ApprovalAction::Rejected => AuditAction::ApprovalRejected,
                ApprovalAction::Returned => AuditAction::ApprovalReturned,
                ApprovalAction::Delegated => AuditAction::ApprovalDelegated,
            };
            self.collaborators
                .audit(
                    AuditRecord::new(
                        record.approver,
                        action,
                        AuditEntity::ApprovalRequest,
                        after.id,
                    )
                    .with_before(&before.status)
                    .with_after(record),
                )
                .await;
        }

        if let Some(commit) = commit {
            self.collaborators
                .audit(
                    AuditRecord::new(
                        Some(actor),
                        AuditAction::VersionCommitted,
                        AuditEntity::Budget,
                        after.budget_id,
                    )
                    .with_before(&commit.expected_current)
                    .with_after(&commit.version),
                )
                .await;
        }

        let last = after.records.last();
        let kind = match after.status {
            ApprovalStatus::UnderReview { level }
                if last.is_some_and(|r| r.action == ApprovalAction::Delegated) =>
            {
                last.and_then(|r| r.delegated_to)
                    .map(|to| NotificationKind::Delegated { to })
                    .unwrap_or(NotificationKind::Advanced { level })
            }
            ApprovalStatus::UnderReview { level } => NotificationKind::Advanced { level },
            ApprovalStatus::Approved => NotificationKind::Approved,
            ApprovalStatus::Rejected => NotificationKind::Rejected,
            ApprovalStatus::Returned => NotificationKind::Returned,
            ApprovalStatus::Draft | ApprovalStatus::Submitted => return,
        };
        self.collaborators.notify(ApprovalNotification {
            request_id: after.id,
            budget_id: after.budget_id,
            submitted_by: after.submitted_by,
            kind,
            comments: last.and_then(|r| r.comments.clone()),
        });
    }
}
