//! Approval workflow domain types.
//!
//! A workflow template is plain data: an ordered list of steps, each
//! naming the role that must act and an optional auto-approval
//! threshold. New routing needs a new template, not new code.

use chrono::{DateTime, Utc};
use fundctl_shared::types::{ApprovalRequestId, ApprovalWorkflowId, BudgetId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::WorkflowError;
use crate::identity::Role;

/// Status of an approval request.
///
/// The valid transitions are:
/// - Draft → Submitted
/// - Submitted → UnderReview(1), or Approved when every level auto-approves
/// - UnderReview(n) → UnderReview(n+1) | Approved | Rejected | Returned
/// - Returned → Submitted (restarts at level 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Created, not yet submitted.
    Draft,
    /// Submitted; about to enter level 1.
    Submitted,
    /// Waiting on the approver of `level`.
    UnderReview {
        /// 1-based level.
        level: u8,
    },
    /// Every level approved.
    Approved,
    /// Rejected at some level.
    Rejected,
    /// Returned to the submitter for changes.
    Returned,
}

impl ApprovalStatus {
    /// Returns the string representation of the status, without the level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview { .. } => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
        }
    }

    /// Level under review, if any.
    #[must_use]
    pub fn level(&self) -> Option<u8> {
        match self {
            Self::UnderReview { level } => Some(*level),
            _ => None,
        }
    }

    /// Rebuilds a status from its string form and stored level.
    pub fn from_parts(status: &str, level: Option<u8>) -> Option<Self> {
        match (status, level) {
            ("draft", _) => Some(Self::Draft),
            ("submitted", _) => Some(Self::Submitted),
            ("under_review", Some(level)) if level > 0 => Some(Self::UnderReview { level }),
            ("approved", _) => Some(Self::Approved),
            ("rejected", _) => Some(Self::Rejected),
            ("returned", _) => Some(Self::Returned),
            _ => None,
        }
    }

    /// Returns true while the request is in flight.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Submitted | Self::UnderReview { .. })
    }

    /// Returns true once no further action is possible.
    #[must_use]
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnderReview { level } => write!(f, "under_review(level={level})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Action recorded in a request's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Request submitted or resubmitted.
    Submitted,
    /// Level approved.
    Approved,
    /// Request rejected.
    Rejected,
    /// Request returned.
    Returned,
    /// Pending level handed to another approver.
    Delegated,
}

impl ApprovalAction {
    /// Returns the string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
            Self::Delegated => "delegated",
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision an approver can make on the pending level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Approve and advance.
    Approve,
    /// Reject; the pending version is discarded.
    Reject,
    /// Return to the submitter; the pending version is kept.
    Return,
}

/// One entry in a request's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// Acting user; `None` for automatic approvals.
    pub approver: Option<UserId>,
    /// Level acted on; 0 for submissions.
    pub level: u8,
    /// What was done.
    pub action: ApprovalAction,
    /// New approver, for delegations.
    pub delegated_to: Option<UserId>,
    /// When.
    pub at: DateTime<Utc>,
    /// Comments.
    pub comments: Option<String>,
}

/// One step of a workflow template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    /// 1-based level.
    pub level: u8,
    /// Role that may act on this level.
    pub required_role: Role,
    /// Amounts at or below this are approved without a human.
    pub auto_approve_threshold: Option<Decimal>,
    /// Advisory number of days the approver has to act.
    pub due_in_days: Option<u32>,
}

impl ApprovalStep {
    /// Returns true if `amount` is covered by the auto-approval threshold.
    #[must_use]
    pub fn auto_approves(&self, amount: Decimal) -> bool {
        self.auto_approve_threshold
            .is_some_and(|threshold| amount <= threshold)
    }
}

/// A workflow template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    /// Unique identifier.
    pub id: ApprovalWorkflowId,
    /// Display name.
    pub name: String,
    /// Steps ordered by level.
    pub steps: Vec<ApprovalStep>,
}

impl ApprovalWorkflow {
    /// Starts building a template.
    pub fn builder(name: impl Into<String>) -> ApprovalWorkflowBuilder {
        ApprovalWorkflowBuilder {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Step for a 1-based level.
    #[must_use]
    pub fn step(&self, level: u8) -> Option<&ApprovalStep> {
        self.steps.get(usize::from(level).checked_sub(1)?)
    }

    /// Number of levels.
    #[must_use]
    pub fn levels(&self) -> usize {
        self.steps.len()
    }

    /// Checks that steps are numbered 1..=N and thresholds are non-negative.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidTemplate` describing the first problem.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.steps.is_empty() {
            return Err(WorkflowError::InvalidTemplate(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }
        if self.steps.len() > usize::from(u8::MAX) {
            return Err(WorkflowError::InvalidTemplate(format!(
                "workflow '{}' has more than {} steps",
                self.name,
                u8::MAX
            )));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if usize::from(step.level) != index + 1 {
                return Err(WorkflowError::InvalidTemplate(format!(
                    "step {} has level {}",
                    index + 1,
                    step.level
                )));
            }
            if step
                .auto_approve_threshold
                .is_some_and(|t| t < Decimal::ZERO)
            {
                return Err(WorkflowError::InvalidTemplate(format!(
                    "step {} has a negative threshold",
                    step.level
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`ApprovalWorkflow`].
#[derive(Debug, Clone)]
pub struct ApprovalWorkflowBuilder {
    name: String,
    steps: Vec<ApprovalStep>,
}

impl ApprovalWorkflowBuilder {
    /// Appends a step requiring `role`.
    #[must_use]
    pub fn step(mut self, role: impl Into<Role>) -> Self {
        let level = u8::try_from(self.steps.len() + 1).unwrap_or(u8::MAX);
        self.steps.push(ApprovalStep {
            level,
            required_role: role.into(),
            auto_approve_threshold: None,
            due_in_days: None,
        });
        self
    }

    /// Sets the auto-approval threshold of the last step.
    #[must_use]
    pub fn auto_approve_up_to(mut self, threshold: Decimal) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.auto_approve_threshold = Some(threshold);
        }
        self
    }

    /// Sets the advisory due period of the last step.
    #[must_use]
    pub fn due_in_days(mut self, days: u32) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.due_in_days = Some(days);
        }
        self
    }

    /// Builds and validates the template.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidTemplate` if validation fails.
    pub fn build(self) -> Result<ApprovalWorkflow, WorkflowError> {
        let workflow = ApprovalWorkflow {
            id: ApprovalWorkflowId::new(),
            name: self.name,
            steps: self.steps,
        };
        workflow.validate()?;
        Ok(workflow)
    }
}

/// An instance of a workflow running against one budget version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique identifier.
    pub id: ApprovalRequestId,
    /// Template in use.
    pub workflow_id: ApprovalWorkflowId,
    /// Budget under approval.
    pub budget_id: BudgetId,
    /// Pending version under approval.
    pub version: u32,
    /// Amount used for auto-approval thresholds.
    pub amount: Decimal,
    /// Status.
    pub status: ApprovalStatus,
    /// Approver the current level was delegated to.
    pub delegated_to: Option<UserId>,
    /// Advisory due date of the current level.
    pub due_at: Option<DateTime<Utc>>,
    /// Who submitted.
    pub submitted_by: UserId,
    /// History, oldest first.
    pub records: Vec<ApprovalRecord>,
    /// Incremented on every save.
    pub revision: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ApprovalRequest {
    /// Creates a draft request for a pending version.
    #[must_use]
    pub fn new(
        workflow_id: ApprovalWorkflowId,
        budget_id: BudgetId,
        version: u32,
        amount: Decimal,
        submitted_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApprovalRequestId::new(),
            workflow_id,
            budget_id,
            version,
            amount,
            status: ApprovalStatus::Draft,
            delegated_to: None,
            due_at: None,
            submitted_by,
            records: Vec::new(),
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_builder_numbers_levels() {
        let workflow = ApprovalWorkflow::builder("two level")
            .step("budget_officer")
            .auto_approve_up_to(dec!(5000))
            .due_in_days(5)
            .step("comptroller")
            .build()
            .unwrap();

        assert_eq!(workflow.levels(), 2);
        let first = workflow.step(1).unwrap();
        assert_eq!(first.required_role, Role::new("budget_officer"));
        assert_eq!(first.due_in_days, Some(5));
        assert!(first.auto_approves(dec!(5000)));
        assert!(!first.auto_approves(dec!(5000.01)));
        assert!(!workflow.step(2).unwrap().auto_approves(dec!(0)));
        assert!(workflow.step(0).is_none());
        assert!(workflow.step(3).is_none());
    }

    #[test]
    fn test_empty_workflow_is_invalid() {
        let result = ApprovalWorkflow::builder("empty").build();
        assert!(matches!(result, Err(WorkflowError::InvalidTemplate(_))));
    }

    #[test]
    fn test_validate_rejects_gaps() {
        let mut workflow = ApprovalWorkflow::builder("gap")
            .step("a")
            .step("b")
            .build()
            .unwrap();
        workflow.steps[1].level = 3;
        assert!(matches!(
            workflow.validate(),
            Err(WorkflowError::InvalidTemplate(_))
        ));
    }

    #[test]
    fn test_template_deserializes_from_json() {
        let workflow: ApprovalWorkflow = serde_json::from_value(serde_json::json!({
            "id": ApprovalWorkflowId::new(),
            "name": "single",
            "steps": [
                { "level": 1, "required_role": "comptroller", "auto_approve_threshold": "250.00", "due_in_days": null }
            ]
        }))
        .unwrap();
        workflow.validate().unwrap();
        assert!(workflow.step(1).unwrap().auto_approves(dec!(250)));
    }

    #[test]
    fn test_status_parts_roundtrip() {
        for status in [
            ApprovalStatus::Draft,
            ApprovalStatus::Submitted,
            ApprovalStatus::UnderReview { level: 3 },
            ApprovalStatus::Approved,
            ApprovalStatus::Rejected,
            ApprovalStatus::Returned,
        ] {
            assert_eq!(
                ApprovalStatus::from_parts(status.as_str(), status.level()),
                Some(status)
            );
        }
        assert_eq!(ApprovalStatus::from_parts("under_review", None), None);
        assert_eq!(
            ApprovalStatus::UnderReview { level: 2 }.to_string(),
            "under_review(level=2)"
        );
    }
}
