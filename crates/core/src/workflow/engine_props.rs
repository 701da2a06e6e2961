//! Property-based tests for the approval state machine.

use chrono::Utc;
use fundctl_shared::types::{BudgetId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::identity::Role;
use crate::workflow::engine::ApprovalEngine;
use crate::workflow::types::{
    ApprovalAction, ApprovalDecision, ApprovalRequest, ApprovalStatus, ApprovalWorkflow,
};

const ROLES: [&str; 3] = ["officer", "director", "comptroller"];

fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_decision() -> impl Strategy<Value = ApprovalDecision> {
    prop_oneof![
        3 => Just(ApprovalDecision::Approve),
        1 => Just(ApprovalDecision::Reject),
        1 => Just(ApprovalDecision::Return),
    ]
}

/// Three-level workflow with optional thresholds per level.
fn workflow(thresholds: &[Option<Decimal>]) -> ApprovalWorkflow {
    let mut builder = ApprovalWorkflow::builder("three level");
    for (role, threshold) in ROLES.iter().zip(thresholds) {
        builder = builder.step(*role);
        if let Some(t) = threshold {
            builder = builder.auto_approve_up_to(*t);
        }
    }
    builder.build().unwrap()
}

fn arb_thresholds() -> impl Strategy<Value = Vec<Option<Decimal>>> {
    prop::collection::vec(prop::option::of(arb_amount()), 3)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every status change made by the engine is an allowed transition and
    /// history only grows.
    #[test]
    fn prop_engine_only_takes_valid_transitions(
        amount in arb_amount(),
        thresholds in arb_thresholds(),
        steps in prop::collection::vec((arb_decision(), 0usize..3), 1..12),
    ) {
        let wf = workflow(&thresholds);
        let mut req = ApprovalRequest::new(wf.id, BudgetId::new(), 2, amount, UserId::new());

        let before = req.status;
        ApprovalEngine::submit(&mut req, &wf, UserId::new(), Utc::now()).unwrap();
        prop_assert!(
            req.status == ApprovalStatus::Approved
                || ApprovalEngine::is_valid_transition(before, ApprovalStatus::Submitted, wf.levels())
        );

        for (decision, role) in steps {
            let status = req.status;
            let records = req.records.len();
            let result = ApprovalEngine::process(
                &mut req,
                &wf,
                UserId::new(),
                &[Role::new(ROLES[role])],
                decision,
                Some("reviewed".into()),
                Utc::now(),
            );

            match result {
                Ok(()) => {
                    prop_assert!(req.records.len() > records);
                    // Anything past the decision itself is a cascaded auto-approval
                    for cascaded in &req.records[records + 1..] {
                        prop_assert_eq!(decision, ApprovalDecision::Approve);
                        prop_assert_eq!(cascaded.action, ApprovalAction::Approved);
                        prop_assert_eq!(cascaded.approver, None);
                    }
                    if req.status != status && req.status != ApprovalStatus::Approved {
                        prop_assert!(ApprovalEngine::is_valid_transition(
                            status,
                            req.status,
                            wf.levels()
                        ));
                    }
                    if req.status == ApprovalStatus::Approved {
                        prop_assert!(status.level().is_some());
                    }
                }
                Err(_) => {
                    prop_assert_eq!(req.status, status);
                    prop_assert_eq!(req.records.len(), records);
                }
            }
        }
    }

    /// A final status accepts no further decision.
    #[test]
    fn prop_final_status_is_terminal(
        amount in arb_amount(),
        decision in arb_decision(),
    ) {
        let wf = workflow(&[None, None, None]);
        let mut req = ApprovalRequest::new(wf.id, BudgetId::new(), 2, amount, UserId::new());
        ApprovalEngine::submit(&mut req, &wf, UserId::new(), Utc::now()).unwrap();
        ApprovalEngine::process(
            &mut req,
            &wf,
            UserId::new(),
            &[Role::new("officer")],
            ApprovalDecision::Reject,
            Some("duplicate request".into()),
            Utc::now(),
        )
        .unwrap();
        let closed = req.clone();

        let all_roles: Vec<Role> = ROLES.iter().map(|r| Role::new(*r)).collect();
        let result = ApprovalEngine::process(
            &mut req,
            &wf,
            UserId::new(),
            &all_roles,
            decision,
            Some("again".into()),
            Utc::now(),
        );
        prop_assert!(result.is_err());
        prop_assert_eq!(req, closed);
    }

    /// Each level whose threshold covers the amount is approved without an
    /// approver, and the request stops at the first level that does not.
    #[test]
    fn prop_auto_approval_cascades(
        amount in arb_amount(),
        thresholds in arb_thresholds(),
    ) {
        let wf = workflow(&thresholds);
        let mut req = ApprovalRequest::new(wf.id, BudgetId::new(), 2, amount, UserId::new());
        ApprovalEngine::submit(&mut req, &wf, UserId::new(), Utc::now()).unwrap();

        let covered = thresholds
            .iter()
            .take_while(|t| t.is_some_and(|t| amount <= t))
            .count();
        let auto: Vec<_> = req
            .records
            .iter()
            .filter(|r| r.action == ApprovalAction::Approved)
            .collect();
        prop_assert_eq!(auto.len(), covered);
        prop_assert!(auto.iter().all(|r| r.approver.is_none()));

        if covered == thresholds.len() {
            prop_assert_eq!(req.status, ApprovalStatus::Approved);
        } else {
            let expected = u8::try_from(covered + 1).unwrap();
            prop_assert_eq!(req.status, ApprovalStatus::UnderReview { level: expected });
        }
    }
}
