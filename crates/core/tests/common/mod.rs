//! Shared fixtures for fund control integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use fundctl_core::audit::MemoryAuditSink;
use fundctl_core::budget::{Budget, CreateBudgetInput, NewLineItem};
use fundctl_core::fiscal::{
    Appropriation, ColorOfMoney, CreateAppropriationInput, FiscalYear, RestrictionFlags,
};
use fundctl_core::identity::{Role, StaticRoleProvider};
use fundctl_core::notify::{ApprovalNotification, ChannelNotifier};
use fundctl_core::workflow::ApprovalWorkflow;
use fundctl_core::{Collaborators, FundControl, MemoryStore};
use fundctl_shared::types::{ApprovalWorkflowId, OrganizationId, UserId};

pub const OFFICER: &str = "budget_officer";
pub const COMPTROLLER: &str = "comptroller";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Harness {
    pub service: FundControl<MemoryStore>,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub notifications: UnboundedReceiver<ApprovalNotification>,
    pub fiscal_year: FiscalYear,
    pub submitter: UserId,
    pub officer: UserId,
    pub comptroller: UserId,
    pub admin: UserId,
}

impl Harness {
    /// Service over a fresh store with FY2026 current.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let (notifier, notifications) = ChannelNotifier::new();
        let submitter = UserId::new();
        let officer = UserId::new();
        let comptroller = UserId::new();
        let admin = UserId::new();
        let roles = StaticRoleProvider::new()
            .with_role(officer, OFFICER)
            .with_role(comptroller, COMPTROLLER)
            .with_role(admin, Role::admin());
        let collaborators = Collaborators::default()
            .with_roles(Arc::new(roles))
            .with_audit(audit.clone())
            .with_notifier(Arc::new(notifier));

        let service = FundControl::new(Arc::clone(&store), collaborators);
        let fiscal_year = service
            .fiscal()
            .create_fiscal_year(2026, date(2026, 1, 15), None)
            .await
            .unwrap();

        Self {
            service,
            store,
            audit,
            notifications,
            fiscal_year,
            submitter,
            officer,
            comptroller,
            admin,
        }
    }

    pub async fn appropriation(&self, amount: Decimal) -> Appropriation {
        self.service
            .fiscal()
            .create_appropriation(
                CreateAppropriationInput {
                    fiscal_year_id: self.fiscal_year.id,
                    color: ColorOfMoney::OperationsMaintenance,
                    appropriated: amount,
                    expiration_date: None,
                    restrictions: RestrictionFlags::default(),
                },
                None,
            )
            .await
            .unwrap()
    }

    /// Officer then comptroller, no thresholds.
    pub async fn two_level_workflow(&self, level_one_threshold: Option<Decimal>) -> ApprovalWorkflowId {
        let mut builder = ApprovalWorkflow::builder("officer then comptroller").step(OFFICER);
        if let Some(threshold) = level_one_threshold {
            builder = builder.auto_approve_up_to(threshold);
        }
        let workflow = builder.step(COMPTROLLER).due_in_days(5).build().unwrap();
        self.service
            .workflow()
            .register_workflow(workflow, None)
            .await
            .unwrap()
            .id
    }

    pub async fn draft_budget(&self, total: Decimal, workflow: Option<ApprovalWorkflowId>) -> Budget {
        self.service
            .versions()
            .create_budget(
                CreateBudgetInput {
                    organization_id: OrganizationId::new(),
                    fiscal_year_id: self.fiscal_year.id,
                    name: "Base operations".into(),
                    approval_workflow_id: workflow,
                    total_amount: total,
                    line_items: vec![
                        NewLineItem {
                            category: "personnel".into(),
                            amount: total * dec!(0.5),
                        },
                        NewLineItem {
                            category: "facilities".into(),
                            amount: total * dec!(0.5),
                        },
                    ],
                },
                self.submitter,
            )
            .await
            .unwrap()
    }

    /// Budget taken through both approval levels.
    pub async fn approved_budget(&self, total: Decimal) -> Budget {
        let workflow = self.two_level_workflow(None).await;
        let budget = self.draft_budget(total, Some(workflow)).await;
        let request = self
            .service
            .submit_for_approval(budget.id, self.submitter)
            .await
            .unwrap();
        for approver in [self.officer, self.comptroller] {
            self.service
                .process_approval(
                    request.id,
                    approver,
                    fundctl_core::workflow::ApprovalDecision::Approve,
                    None,
                )
                .await
                .unwrap();
        }
        self.service.versions().budget(budget.id).await.unwrap()
    }

    /// Drains notifications received so far.
    pub fn drain_notifications(&mut self) -> Vec<ApprovalNotification> {
        let mut received = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            received.push(notification);
        }
        received
    }
}
