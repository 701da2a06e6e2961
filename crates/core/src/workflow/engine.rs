//! Approval state machine.
//!
//! Pure functions over an [`ApprovalRequest`]; persistence, roles lookup
//! and side effects live in the workflow service.

use chrono::{DateTime, Duration, Utc};
use fundctl_shared::types::UserId;

use super::error::WorkflowError;
use super::types::{
    ApprovalAction, ApprovalDecision, ApprovalRecord, ApprovalRequest, ApprovalStatus,
    ApprovalWorkflow,
};
use crate::identity::Role;

/// Stateless approval engine.
pub struct ApprovalEngine;

impl ApprovalEngine {
    /// Returns true if `from -> to` is allowed for a workflow with `levels` steps.
    #[must_use]
    pub fn is_valid_transition(from: ApprovalStatus, to: ApprovalStatus, levels: usize) -> bool {
        let within = |level: u8| level >= 1 && usize::from(level) <= levels;
        match (from, to) {
            (ApprovalStatus::Draft | ApprovalStatus::Returned, ApprovalStatus::Submitted)
            | (
                ApprovalStatus::Submitted | ApprovalStatus::UnderReview { .. },
                ApprovalStatus::Approved,
            )
            | (
                ApprovalStatus::UnderReview { .. },
                ApprovalStatus::Rejected | ApprovalStatus::Returned,
            ) => true,
            (ApprovalStatus::Submitted, ApprovalStatus::UnderReview { level }) => within(level),
            (ApprovalStatus::UnderReview { level: from }, ApprovalStatus::UnderReview { level: to }) => {
                to > from && within(to)
            }
            _ => false,
        }
    }

    /// Submits a draft or returned request, entering level 1.
    ///
    /// Every level whose threshold covers the amount is approved
    /// automatically, so the request may come out approved.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the request is a draft or was
    /// returned.
    pub fn submit(
        request: &mut ApprovalRequest,
        workflow: &ApprovalWorkflow,
        submitter: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        if !matches!(
            request.status,
            ApprovalStatus::Draft | ApprovalStatus::Returned
        ) {
            return Err(WorkflowError::InvalidTransition {
                from: request.status,
                action: "submit",
            });
        }

        request.records.push(ApprovalRecord {
            approver: Some(submitter),
            level: 0,
            action: ApprovalAction::Submitted,
            delegated_to: None,
            at: now,
            comments: None,
        });
        request.submitted_by = submitter;
        request.status = ApprovalStatus::Submitted;
        Self::enter_level(request, workflow, Some(1), now);
        Ok(())
    }

    /// Applies an approver's decision to the pending level.
    ///
    /// The status is checked before the approver's authority.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when no level is pending,
    /// `UnauthorizedApprover` when the approver cannot act on it, and
    /// `ReasonRequired` when rejecting or returning without a comment.
    pub fn process(
        request: &mut ApprovalRequest,
        workflow: &ApprovalWorkflow,
        approver: UserId,
        roles: &[Role],
        decision: ApprovalDecision,
        comments: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        let (verb, action) = match decision {
            ApprovalDecision::Approve => ("approve", ApprovalAction::Approved),
            ApprovalDecision::Reject => ("reject", ApprovalAction::Rejected),
            ApprovalDecision::Return => ("return", ApprovalAction::Returned),
        };
        let level = Self::authorize(request, workflow, approver, roles, verb)?;

        let comments = comments.filter(|c| !c.trim().is_empty());
        if decision != ApprovalDecision::Approve && comments.is_none() {
            return Err(WorkflowError::ReasonRequired(verb));
        }

        request.records.push(ApprovalRecord {
            approver: Some(approver),
            level,
            action,
            delegated_to: None,
            at: now,
            comments,
        });

        match decision {
            ApprovalDecision::Approve => {
                Self::enter_level(request, workflow, level.checked_add(1), now);
            }
            ApprovalDecision::Reject => Self::close(request, ApprovalStatus::Rejected, now),
            ApprovalDecision::Return => Self::close(request, ApprovalStatus::Returned, now),
        }
        Ok(())
    }

    /// Hands the pending level to another approver without changing level.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when no level is pending and
    /// `UnauthorizedApprover` when `actor` cannot act on it.
    pub fn delegate(
        request: &mut ApprovalRequest,
        workflow: &ApprovalWorkflow,
        actor: UserId,
        roles: &[Role],
        to: UserId,
        now: DateTime<Utc>,
    ) -> Result<u8, WorkflowError> {
        let level = Self::authorize(request, workflow, actor, roles, "delegate")?;

        request.records.push(ApprovalRecord {
            approver: Some(actor),
            level,
            action: ApprovalAction::Delegated,
            delegated_to: Some(to),
            at: now,
            comments: None,
        });
        request.delegated_to = Some(to);
        request.updated_at = now;
        Ok(level)
    }

    /// Returns the pending level if `actor` may act on it.
    ///
    /// After a delegation only the delegate may act on the level.
    fn authorize(
        request: &ApprovalRequest,
        workflow: &ApprovalWorkflow,
        actor: UserId,
        roles: &[Role],
        verb: &'static str,
    ) -> Result<u8, WorkflowError> {
        let level = request
            .status
            .level()
            .ok_or(WorkflowError::InvalidTransition {
                from: request.status,
                action: verb,
            })?;
        let step = workflow.step(level).ok_or_else(|| {
            WorkflowError::InvalidTemplate(format!(
                "workflow '{}' has no level {level}",
                workflow.name
            ))
        })?;

        let allowed = match request.delegated_to {
            Some(delegate) => delegate == actor,
            None => roles.contains(&step.required_role),
        };
        if !allowed {
            return Err(WorkflowError::UnauthorizedApprover {
                approver: actor,
                level,
            });
        }
        Ok(level)
    }

    /// Enters `level`, auto-approving every level whose threshold covers
    /// the amount. Past the last level the request is approved.
    fn enter_level(
        request: &mut ApprovalRequest,
        workflow: &ApprovalWorkflow,
        mut level: Option<u8>,
        now: DateTime<Utc>,
    ) {
        while let Some(current) = level {
            let Some(step) = workflow.step(current) else {
                break;
            };
            if !step.auto_approves(request.amount) {
                request.status = ApprovalStatus::UnderReview { level: current };
                request.delegated_to = None;
                request.due_at = step
                    .due_in_days
                    .map(|days| now + Duration::days(i64::from(days)));
                request.updated_at = now;
                return;
            }
            request.records.push(ApprovalRecord {
                approver: None,
                level: current,
                action: ApprovalAction::Approved,
                delegated_to: None,
                at: now,
                comments: Some(format!(
                    "auto-approved: amount {} within threshold",
                    request.amount
                )),
            });
            level = current.checked_add(1);
        }
        Self::close(request, ApprovalStatus::Approved, now);
    }

    fn close(request: &mut ApprovalRequest, status: ApprovalStatus, now: DateTime<Utc>) {
        request.status = status;
        request.delegated_to = None;
        request.due_at = None;
        request.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundctl_shared::types::BudgetId;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn two_level(threshold: Decimal) -> ApprovalWorkflow {
        ApprovalWorkflow::builder("two level")
            .step("budget_officer")
            .auto_approve_up_to(threshold)
            .step("comptroller")
            .due_in_days(3)
            .build()
            .unwrap()
    }

    fn request(workflow: &ApprovalWorkflow, amount: Decimal) -> ApprovalRequest {
        ApprovalRequest::new(workflow.id, BudgetId::new(), 2, amount, UserId::new())
    }

    #[test]
    fn test_submit_enters_level_one() {
        let workflow = two_level(dec!(5000));
        let mut req = request(&workflow, dec!(8000));
        let submitter = UserId::new();

        ApprovalEngine::submit(&mut req, &workflow, submitter, Utc::now()).unwrap();
        assert_eq!(req.status, ApprovalStatus::UnderReview { level: 1 });
        assert_eq!(req.records.len(), 1);
        assert_eq!(req.records[0].action, ApprovalAction::Submitted);
        assert!(req.due_at.is_none());
    }

    #[test]
    fn test_submit_auto_approves_level_one() {
        let workflow = two_level(dec!(5000));
        let mut req = request(&workflow, dec!(4000));
        let now = Utc::now();

        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), now).unwrap();
        assert_eq!(req.status, ApprovalStatus::UnderReview { level: 2 });
        assert_eq!(req.records[1].approver, None);
        assert_eq!(req.records[1].action, ApprovalAction::Approved);
        assert_eq!(req.records[1].level, 1);
        assert_eq!(req.due_at, Some(now + Duration::days(3)));
    }

    #[test]
    fn test_every_level_auto_approved() {
        let workflow = ApprovalWorkflow::builder("small purchases")
            .step("officer")
            .auto_approve_up_to(dec!(1000))
            .build()
            .unwrap();
        let mut req = request(&workflow, dec!(999.99));

        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now()).unwrap();
        assert_eq!(req.status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_submit_twice_is_invalid() {
        let workflow = two_level(dec!(0));
        let mut req = request(&workflow, dec!(10));
        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now()).unwrap();

        let result = ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now());
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidTransition { action: "submit", .. })
        ));
    }

    #[test]
    fn test_higher_level_cannot_act_early() {
        let workflow = two_level(dec!(0));
        let mut req = request(&workflow, dec!(10));
        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now()).unwrap();
        let before = req.clone();

        let result = ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &[Role::new("comptroller")],
            ApprovalDecision::Approve,
            None,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(WorkflowError::UnauthorizedApprover { level: 1, .. })
        ));
        assert_eq!(req, before);
    }

    #[test]
    fn test_full_approval() {
        let workflow = two_level(dec!(0));
        let mut req = request(&workflow, dec!(10));
        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now()).unwrap();

        ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &[Role::new("budget_officer")],
            ApprovalDecision::Approve,
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(req.status, ApprovalStatus::UnderReview { level: 2 });

        ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &[Role::new("comptroller")],
            ApprovalDecision::Approve,
            Some("ok".into()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(req.status, ApprovalStatus::Approved);
        assert!(req.due_at.is_none());
    }

    #[test]
    fn test_manual_approval_cascades_into_covered_level() {
        let workflow = ApprovalWorkflow::builder("cascade")
            .step("budget_officer")
            .step("director")
            .auto_approve_up_to(dec!(30000))
            .step("comptroller")
            .build()
            .unwrap();
        let mut req = request(&workflow, dec!(24114.01));
        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now()).unwrap();
        let officer = UserId::new();

        ApprovalEngine::process(
            &mut req,
            &workflow,
            officer,
            &[Role::new("budget_officer")],
            ApprovalDecision::Approve,
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(req.status, ApprovalStatus::UnderReview { level: 3 });
        assert_eq!(req.records.len(), 3);
        assert_eq!(req.records[1].approver, Some(officer));
        assert_eq!(req.records[2].approver, None);
        assert_eq!(req.records[2].action, ApprovalAction::Approved);
        assert_eq!(req.records[2].level, 2);
    }

    #[test]
    fn test_reject_requires_reason() {
        let workflow = two_level(dec!(0));
        let mut req = request(&workflow, dec!(10));
        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now()).unwrap();
        let officer = [Role::new("budget_officer")];

        let result = ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &officer,
            ApprovalDecision::Reject,
            Some("   ".into()),
            Utc::now(),
        );
        assert!(matches!(result, Err(WorkflowError::ReasonRequired("reject"))));

        ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &officer,
            ApprovalDecision::Reject,
            Some("exceeds ceiling".into()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(req.status, ApprovalStatus::Rejected);
    }

    #[test]
    fn test_returned_request_restarts_at_level_one() {
        let workflow = two_level(dec!(0));
        let mut req = request(&workflow, dec!(10));
        let submitter = UserId::new();
        ApprovalEngine::submit(&mut req, &workflow, submitter, Utc::now()).unwrap();
        ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &[Role::new("budget_officer")],
            ApprovalDecision::Approve,
            None,
            Utc::now(),
        )
        .unwrap();
        ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &[Role::new("comptroller")],
            ApprovalDecision::Return,
            Some("split travel line".into()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(req.status, ApprovalStatus::Returned);
        assert_eq!(
            req.records.last().unwrap().comments.as_deref(),
            Some("split travel line")
        );

        ApprovalEngine::submit(&mut req, &workflow, submitter, Utc::now()).unwrap();
        assert_eq!(req.status, ApprovalStatus::UnderReview { level: 1 });
    }

    #[test]
    fn test_delegation_restricts_level_to_delegate() {
        let workflow = two_level(dec!(0));
        let mut req = request(&workflow, dec!(10));
        ApprovalEngine::submit(&mut req, &workflow, UserId::new(), Utc::now()).unwrap();
        let officer = [Role::new("budget_officer")];
        let deputy = UserId::new();

        let level =
            ApprovalEngine::delegate(&mut req, &workflow, UserId::new(), &officer, deputy, Utc::now())
                .unwrap();
        assert_eq!(level, 1);
        assert_eq!(req.status, ApprovalStatus::UnderReview { level: 1 });
        assert_eq!(req.records.last().unwrap().action, ApprovalAction::Delegated);

        let result = ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &officer,
            ApprovalDecision::Approve,
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(WorkflowError::UnauthorizedApprover { .. })));

        ApprovalEngine::process(
            &mut req,
            &workflow,
            deputy,
            &[],
            ApprovalDecision::Approve,
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(req.status, ApprovalStatus::UnderReview { level: 2 });
        assert_eq!(req.delegated_to, None);
    }

    #[test]
    fn test_process_on_closed_request_is_invalid_transition() {
        let workflow = two_level(dec!(100));
        let mut req = request(&workflow, dec!(10));
        req.status = ApprovalStatus::Approved;

        let result = ApprovalEngine::process(
            &mut req,
            &workflow,
            UserId::new(),
            &[Role::new("budget_officer")],
            ApprovalDecision::Approve,
            None,
            Utc::now(),
        );
        assert!(matches!(
            result,
            Err(WorkflowError::InvalidTransition {
                from: ApprovalStatus::Approved,
                ..
            })
        ));
    }
}
