//! End-to-end fund control scenarios against the in-memory store.

mod common;

use common::{Harness, date};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fundctl_core::audit::AuditAction;
use fundctl_core::budget::{BudgetChanges, BudgetStatus, VersionError, VersionSource, VersionState};
use fundctl_core::fiscal::FiscalError;
use fundctl_core::notify::NotificationKind;
use fundctl_core::obligation::{CreateExpenditureInput, CreateObligationInput, ObligationError};
use fundctl_core::workflow::{ApprovalAction, ApprovalDecision, ApprovalStatus, WorkflowError};
use fundctl_shared::AppError;

fn obligation(
    budget: &fundctl_core::budget::Budget,
    appropriation: &fundctl_core::fiscal::Appropriation,
    amount: Decimal,
) -> CreateObligationInput {
    CreateObligationInput {
        budget_id: budget.id,
        appropriation_id: appropriation.id,
        line_item_id: None,
        amount,
        date: date(2026, 3, 1),
        bona_fide_need_justification: None,
    }
}

#[tokio::test]
async fn test_scenario_a_funds_unavailable_reports_shortfall() {
    let h = Harness::new().await;
    let appropriation = h.appropriation(dec!(100000)).await;
    let budget = h.approved_budget(dec!(200000)).await;

    h.service
        .create_obligation(obligation(&budget, &appropriation, dec!(60000)), h.submitter)
        .await
        .unwrap();

    let err = h
        .service
        .create_obligation(obligation(&budget, &appropriation, dec!(50000)), h.submitter)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ObligationError::Fiscal(FiscalError::FundsUnavailable { shortfall, .. })
            if shortfall == dec!(10000)
    ));

    let check = h
        .service
        .check_fund_availability(appropriation.id, dec!(50000))
        .await
        .unwrap();
    assert!(!check.available);
    assert_eq!(check.available_balance, dec!(40000));
    assert_eq!(
        h.service
            .fiscal()
            .appropriation(appropriation.id)
            .await
            .unwrap()
            .obligated,
        dec!(60000)
    );
}

#[tokio::test]
async fn test_scenario_b_threshold_skips_level_one() {
    let h = Harness::new().await;
    let workflow = h.two_level_workflow(Some(dec!(5000))).await;
    let budget = h.draft_budget(dec!(4000), Some(workflow)).await;

    let request = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();
    assert_eq!(request.status, ApprovalStatus::UnderReview { level: 2 });
    assert!(request.due_at.is_some());

    let history = h.service.get_approval_history(request.id).await.unwrap();
    let actions: Vec<_> = history.iter().map(|r| (r.action, r.level)).collect();
    assert_eq!(
        actions,
        vec![(ApprovalAction::Submitted, 0), (ApprovalAction::Approved, 1)]
    );
    assert_eq!(history[1].approver, None);

    let stored = h.service.versions().budget(budget.id).await.unwrap();
    assert_eq!(stored.status, BudgetStatus::UnderReview);
}

#[tokio::test]
async fn test_scenario_c_expenditure_ceiling() {
    let h = Harness::new().await;
    let appropriation = h.appropriation(dec!(100000)).await;
    let budget = h.approved_budget(dec!(100000)).await;
    let obligation = h
        .service
        .create_obligation(obligation(&budget, &appropriation, dec!(10000)), h.submitter)
        .await
        .unwrap();
    let spend = |amount| CreateExpenditureInput {
        obligation_id: obligation.id,
        amount,
        date: date(2026, 3, 15),
    };

    let err = h
        .service
        .create_expenditure(spend(dec!(10001)), h.submitter)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ObligationError::ExpenditureExceedsObligation { remaining, .. } if remaining == dec!(10000)
    ));

    h.service
        .create_expenditure(spend(dec!(10000)), h.submitter)
        .await
        .unwrap();
    let summary = h.service.get_variance_summary(budget.id).await.unwrap();
    assert_eq!(summary.obligated, dec!(10000));
    assert_eq!(summary.expended, dec!(10000));
    assert_eq!(summary.unliquidated_obligations, Decimal::ZERO);
    assert_eq!(summary.unobligated_balance, dec!(90000));
}

#[tokio::test]
async fn test_scenario_d_final_approval_commits_version() {
    let mut h = Harness::new().await;
    let workflow = h.two_level_workflow(None).await;
    let budget = h.draft_budget(dec!(50000), Some(workflow)).await;
    assert_eq!(h.service.get_version_history(budget.id).await.unwrap().len(), 1);

    let request = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();
    assert_eq!(request.status, ApprovalStatus::UnderReview { level: 1 });
    h.service
        .process_approval(request.id, h.officer, ApprovalDecision::Approve, None)
        .await
        .unwrap();
    let approved = h
        .service
        .process_approval(
            request.id,
            h.comptroller,
            ApprovalDecision::Approve,
            Some("within ceiling".into()),
        )
        .await
        .unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);

    let history = h.service.get_version_history(budget.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].state, VersionState::Frozen);
    assert_eq!(history[1].state, VersionState::Current);

    let stored = h.service.versions().budget(budget.id).await.unwrap();
    assert_eq!(stored.status, BudgetStatus::Approved);
    assert_eq!(stored.current_version, 2);
    assert_eq!(stored.previous_version, Some(1));
    assert_eq!(stored.approved_amount, dec!(50000));

    assert_eq!(h.audit.records_for(AuditAction::VersionCommitted).await.len(), 1);
    let kinds: Vec<_> = h.drain_notifications().into_iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::Advanced { level: 1 },
            NotificationKind::Advanced { level: 2 },
            NotificationKind::Approved,
        ]
    );
}

#[tokio::test]
async fn test_rollback_round_trip() {
    let h = Harness::new().await;
    let budget = h.approved_budget(dec!(50000)).await;
    let original = h
        .service
        .versions()
        .current_version(budget.id)
        .await
        .unwrap();

    let amended = h
        .service
        .create_budget_version(
            budget.id,
            budget.current_version,
            BudgetChanges {
                total_amount: Some(dec!(80000)),
                ..BudgetChanges::default()
            },
            h.submitter,
        )
        .await
        .unwrap();
    let request = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();
    assert_eq!(request.version, amended.number);
    for approver in [h.officer, h.comptroller] {
        h.service
            .process_approval(request.id, approver, ApprovalDecision::Approve, None)
            .await
            .unwrap();
    }
    assert_eq!(
        h.service.versions().budget(budget.id).await.unwrap().approved_amount,
        dec!(80000)
    );

    let rolled_back = h
        .service
        .rollback_budget(budget.id, original.number, h.admin)
        .await
        .unwrap();
    assert_eq!(rolled_back.state, VersionState::Current);
    assert_eq!(rolled_back.source, VersionSource::Rollback { from: original.number });
    assert_eq!(rolled_back.total_amount, original.total_amount);
    assert_eq!(rolled_back.line_items, original.line_items);
    assert!(rolled_back.number > amended.number);

    let history = h.service.get_version_history(budget.id).await.unwrap();
    let target = history.iter().find(|v| v.number == original.number).unwrap();
    assert_eq!(target.state, VersionState::Frozen);
    assert_eq!(target.total_amount, original.total_amount);

    let stored = h.service.versions().budget(budget.id).await.unwrap();
    assert_eq!(stored.current_version, rolled_back.number);
    assert_eq!(stored.approved_amount, original.total_amount);
}

#[tokio::test]
async fn test_rollback_by_non_admin_needs_approval() {
    let h = Harness::new().await;
    let budget = h.approved_budget(dec!(50000)).await;

    let version = h
        .service
        .rollback_budget(budget.id, 1, h.submitter)
        .await
        .unwrap();
    assert_eq!(version.state, VersionState::Pending);
    let stored = h.service.versions().budget(budget.id).await.unwrap();
    assert_eq!(stored.current_version, budget.current_version);

    let err = h
        .service
        .rollback_budget(budget.id, 99, h.admin)
        .await
        .unwrap_err();
    assert!(matches!(err, VersionError::VersionNotFound { version: 99, .. }));
}

#[tokio::test]
async fn test_stale_version_is_rejected() {
    let h = Harness::new().await;
    let budget = h.approved_budget(dec!(50000)).await;

    let err = h
        .service
        .create_budget_version(budget.id, 1, BudgetChanges::default(), h.submitter)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        VersionError::VersionConflict { expected: 1, actual: 2, .. }
    ));
}

#[tokio::test]
async fn test_cancel_is_idempotent_without_double_release() {
    let h = Harness::new().await;
    let appropriation = h.appropriation(dec!(100000)).await;
    let budget = h.approved_budget(dec!(100000)).await;
    h.service
        .create_obligation(obligation(&budget, &appropriation, dec!(20000)), h.submitter)
        .await
        .unwrap();
    let cancelled = h
        .service
        .create_obligation(obligation(&budget, &appropriation, dec!(30000)), h.submitter)
        .await
        .unwrap();

    h.service
        .cancel_obligation(cancelled.id, h.submitter)
        .await
        .unwrap();
    let err = h
        .service
        .cancel_obligation(cancelled.id, h.submitter)
        .await
        .unwrap_err();
    assert!(matches!(err, ObligationError::InvalidTransition(_)));

    let appropriation = h
        .service
        .fiscal()
        .appropriation(appropriation.id)
        .await
        .unwrap();
    assert_eq!(appropriation.obligated, dec!(20000));
    let stored = h.service.versions().budget(budget.id).await.unwrap();
    assert_eq!(stored.obligated_amount, dec!(20000));
}

#[tokio::test]
async fn test_level_two_approver_cannot_act_at_level_one() {
    let h = Harness::new().await;
    let workflow = h.two_level_workflow(None).await;
    let budget = h.draft_budget(dec!(10000), Some(workflow)).await;
    let request = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();

    let err = h
        .service
        .process_approval(request.id, h.comptroller, ApprovalDecision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::UnauthorizedApprover { level: 1, .. }
    ));
    let app: AppError = err.into();
    assert!(matches!(app, AppError::Forbidden(_)));

    let unchanged = h.service.workflow().request(request.id).await.unwrap();
    assert_eq!(unchanged, request);
}

#[tokio::test]
async fn test_rejection_discards_pending_version() {
    let mut h = Harness::new().await;
    let workflow = h.two_level_workflow(None).await;
    let budget = h.draft_budget(dec!(10000), Some(workflow)).await;
    let request = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();

    let err = h
        .service
        .process_approval(request.id, h.officer, ApprovalDecision::Reject, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ReasonRequired("reject")));

    let rejected = h
        .service
        .process_approval(
            request.id,
            h.officer,
            ApprovalDecision::Reject,
            Some("no funding source".into()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);

    let stored = h.service.versions().budget(budget.id).await.unwrap();
    assert_eq!(stored.status, BudgetStatus::Rejected);
    assert_eq!(stored.current_version, 1);
    assert!(h.service.versions().open_pending(budget.id).await.unwrap().is_none());

    let last = h.drain_notifications().pop().unwrap();
    assert_eq!(last.kind, NotificationKind::Rejected);
    assert_eq!(last.comments.as_deref(), Some("no funding source"));
}

#[tokio::test]
async fn test_returned_request_is_resubmitted() {
    let h = Harness::new().await;
    let workflow = h.two_level_workflow(None).await;
    let budget = h.draft_budget(dec!(10000), Some(workflow)).await;
    let request = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();
    h.service
        .process_approval(request.id, h.officer, ApprovalDecision::Approve, None)
        .await
        .unwrap();
    let returned = h
        .service
        .process_approval(
            request.id,
            h.comptroller,
            ApprovalDecision::Return,
            Some("split facilities line".into()),
        )
        .await
        .unwrap();
    assert_eq!(returned.status, ApprovalStatus::Returned);
    assert_eq!(
        h.service.versions().budget(budget.id).await.unwrap().status,
        BudgetStatus::Returned
    );

    let resubmitted = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();
    assert_eq!(resubmitted.id, request.id);
    assert_eq!(resubmitted.status, ApprovalStatus::UnderReview { level: 1 });
    assert_eq!(resubmitted.version, request.version);
    assert_eq!(resubmitted.revision, returned.revision + 1);
    assert_eq!(resubmitted.records.len(), 4);
}

#[tokio::test]
async fn test_delegate_acts_for_level() {
    let mut h = Harness::new().await;
    let workflow = h.two_level_workflow(None).await;
    let budget = h.draft_budget(dec!(10000), Some(workflow)).await;
    let request = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();
    let deputy = fundctl_shared::types::UserId::new();

    h.service
        .delegate_approval(request.id, h.officer, deputy)
        .await
        .unwrap();
    let err = h
        .service
        .process_approval(request.id, h.officer, ApprovalDecision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnauthorizedApprover { .. }));

    let advanced = h
        .service
        .process_approval(request.id, deputy, ApprovalDecision::Approve, None)
        .await
        .unwrap();
    assert_eq!(advanced.status, ApprovalStatus::UnderReview { level: 2 });
    assert_eq!(advanced.delegated_to, None);
    assert_eq!(h.audit.records_for(AuditAction::ApprovalDelegated).await.len(), 1);
    assert!(h
        .drain_notifications()
        .iter()
        .any(|n| n.kind == NotificationKind::Delegated { to: deputy }));
}

#[tokio::test]
async fn test_submit_without_workflow() {
    let h = Harness::new().await;
    let budget = h.draft_budget(dec!(10000), None).await;

    let err = h
        .service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NoWorkflowConfigured(_)));
    assert_eq!(err.status_code(), 422);
}

#[tokio::test]
async fn test_open_request_blocks_second_submission() {
    let h = Harness::new().await;
    let workflow = h.two_level_workflow(None).await;
    let budget = h.draft_budget(dec!(10000), Some(workflow)).await;
    h.service
        .submit_for_approval(budget.id, h.submitter)
        .await
        .unwrap();

    assert!(matches!(
        h.service.submit_for_approval(budget.id, h.submitter).await,
        Err(WorkflowError::InvalidTransition { action: "submit", .. })
    ));
    assert!(matches!(
        h.service
            .create_budget_version(budget.id, 1, BudgetChanges::default(), h.submitter)
            .await,
        Err(VersionError::UnderReview(_))
    ));
}

#[tokio::test]
async fn test_every_state_change_is_audited() {
    let h = Harness::new().await;
    let appropriation = h.appropriation(dec!(100000)).await;
    let budget = h.approved_budget(dec!(100000)).await;
    let obligation = h
        .service
        .create_obligation(obligation(&budget, &appropriation, dec!(500)), h.submitter)
        .await
        .unwrap();
    h.service
        .create_expenditure(
            CreateExpenditureInput {
                obligation_id: obligation.id,
                amount: dec!(100),
                date: date(2026, 3, 2),
            },
            h.submitter,
        )
        .await
        .unwrap();

    for action in [
        AuditAction::FiscalYearCreated,
        AuditAction::AppropriationCreated,
        AuditAction::WorkflowRegistered,
        AuditAction::BudgetCreated,
        AuditAction::VersionCreated,
        AuditAction::ApprovalSubmitted,
        AuditAction::ApprovalApproved,
        AuditAction::VersionCommitted,
        AuditAction::ObligationCreated,
        AuditAction::ExpenditurePosted,
    ] {
        assert!(
            !h.audit.records_for(action).await.is_empty(),
            "missing audit record for {action}"
        );
    }
    let approvals = h.audit.records_for(AuditAction::ApprovalApproved).await;
    assert_eq!(approvals.len(), 2);
    assert!(approvals.iter().all(|r| r.actor.is_some()));
}

#[tokio::test]
async fn test_store_outage_is_infrastructure_error() {
    let h = Harness::new().await;
    let appropriation = h.appropriation(dec!(100000)).await;
    let budget = h.approved_budget(dec!(100000)).await;
    h.store.set_unavailable(true);

    let err = h
        .service
        .create_obligation(obligation(&budget, &appropriation, dec!(500)), h.submitter)
        .await
        .unwrap_err();
    assert!(matches!(err, ObligationError::Store(_)));
    assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    let app: AppError = err.into();
    assert!(app.is_infrastructure());

    h.store.set_unavailable(false);
    let appropriation = h
        .service
        .fiscal()
        .appropriation(appropriation.id)
        .await
        .unwrap();
    assert_eq!(appropriation.obligated, Decimal::ZERO);
}

#[tokio::test]
async fn test_fiscal_rollover_closes_year() {
    let h = Harness::new().await;
    let next = h
        .service
        .fiscal()
        .create_fiscal_year(2027, date(2026, 1, 15), None)
        .await
        .unwrap();

    let transitions = h
        .service
        .fiscal()
        .advance_fiscal_years(date(2026, 10, 1))
        .await
        .unwrap();
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0].fiscal_year_id, h.fiscal_year.id);
    assert_eq!(transitions[1].fiscal_year_id, next.id);

    let appropriation = h
        .service
        .fiscal()
        .create_appropriation(
            fundctl_core::fiscal::CreateAppropriationInput {
                fiscal_year_id: next.id,
                color: fundctl_core::fiscal::ColorOfMoney::Procurement,
                appropriated: dec!(1000),
                expiration_date: None,
                restrictions: fundctl_core::fiscal::RestrictionFlags::default(),
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(appropriation.expiration_date, date(2029, 9, 30));
}
