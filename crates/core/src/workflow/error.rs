//! Approval workflow error types.

use fundctl_shared::types::{ApprovalRequestId, ApprovalWorkflowId, BudgetId, UserId};
use thiserror::Error;

use crate::budget::VersionError;
use crate::store::StoreError;
use crate::workflow::types::ApprovalStatus;

/// Errors that can occur during approval workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Approver does not hold the role of the pending level, or the level
    /// was delegated to someone else.
    #[error("User {approver} is not authorized to act on level {level}")]
    UnauthorizedApprover {
        /// User who attempted to act.
        approver: UserId,
        /// Level pending at the time.
        level: u8,
    },

    /// Action is not allowed in the request's current status.
    #[error("Cannot {action} a request that is {from}")]
    InvalidTransition {
        /// Current status.
        from: ApprovalStatus,
        /// Attempted action.
        action: &'static str,
    },

    /// Reject and return need a comment for the submitter.
    #[error("A reason is required to {0}")]
    ReasonRequired(&'static str),

    /// Workflow template not found.
    #[error("Workflow {0} not found")]
    WorkflowNotFound(ApprovalWorkflowId),

    /// Approval request not found.
    #[error("Approval request {0} not found")]
    RequestNotFound(ApprovalRequestId),

    /// Budget not found.
    #[error("Budget {0} not found")]
    BudgetNotFound(BudgetId),

    /// Budget has no workflow template.
    #[error("Budget {0} has no approval workflow configured")]
    NoWorkflowConfigured(BudgetId),

    /// Template failed validation.
    #[error("Invalid workflow template: {0}")]
    InvalidTemplate(String),

    /// Request changed since it was read.
    #[error("Approval request {0} was modified concurrently; reload and retry")]
    ConcurrentUpdate(ApprovalRequestId),

    /// Version store failure.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Returns the HTTP-equivalent status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidTransition { .. }
            | Self::ReasonRequired(_)
            | Self::InvalidTemplate(_) => 400,

            Self::UnauthorizedApprover { .. } => 403,

            Self::WorkflowNotFound(_) | Self::RequestNotFound(_) | Self::BudgetNotFound(_) => 404,

            Self::ConcurrentUpdate(_) => 409,

            Self::NoWorkflowConfigured(_) => 422,

            Self::Version(e) => e.status_code(),
            Self::Store(e) => e.status_code(),
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnauthorizedApprover { .. } => "UNAUTHORIZED_APPROVER",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::ReasonRequired(_) => "REASON_REQUIRED",
            Self::WorkflowNotFound(_) => "WORKFLOW_NOT_FOUND",
            Self::RequestNotFound(_) => "REQUEST_NOT_FOUND",
            Self::BudgetNotFound(_) => "BUDGET_NOT_FOUND",
            Self::NoWorkflowConfigured(_) => "NO_WORKFLOW_CONFIGURED",
            Self::InvalidTemplate(_) => "INVALID_TEMPLATE",
            Self::ConcurrentUpdate(_) => "CONCURRENT_UPDATE",
            Self::Version(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_approver_error() {
        let err = WorkflowError::UnauthorizedApprover {
            approver: UserId::new(),
            level: 1,
        };
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.error_code(), "UNAUTHORIZED_APPROVER");
        assert!(err.to_string().contains("level 1"));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = WorkflowError::InvalidTransition {
            from: ApprovalStatus::Approved,
            action: "approve",
        };
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Cannot approve a request that is approved");
    }

    #[test]
    fn test_reason_required_error() {
        let err = WorkflowError::ReasonRequired("reject");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "REASON_REQUIRED");
    }

    #[test]
    fn test_version_error_passes_through() {
        let err = WorkflowError::from(VersionError::VersionConflict {
            budget_id: BudgetId::new(),
            expected: 1,
            actual: 2,
        });
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "VERSION_CONFLICT");
    }
}
