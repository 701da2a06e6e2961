//! The fund control service.
//!
//! [`FundControl`] wires the ledgers, the version store, the approval
//! engine and the variance analyzer over one store and one set of
//! collaborators, and exposes the operations callers use.

use fundctl_shared::types::{
    AppropriationId, ApprovalRequestId, BudgetId, ObligationId, UserId,
};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::budget::{
    BudgetChanges, BudgetVersion, BudgetVersionStore, VarianceAnalyzer, VarianceSummary,
    VersionError,
};
use crate::collaborators::Collaborators;
use crate::fiscal::{AvailabilityCheck, FiscalError, FiscalLedger};
use crate::obligation::{
    CreateExpenditureInput, CreateObligationInput, Expenditure, Obligation, ObligationError,
    ObligationLedger,
};
use crate::store::FundControlStore;
use crate::workflow::{
    ApprovalDecision, ApprovalRecord, ApprovalRequest, ApprovalWorkflowEngine, WorkflowError,
};

/// Entry point for fund control operations.
pub struct FundControl<S> {
    fiscal: FiscalLedger<S>,
    obligations: ObligationLedger<S>,
    versions: BudgetVersionStore<S>,
    workflow: ApprovalWorkflowEngine<S>,
    variance: VarianceAnalyzer<S>,
}

impl<S> Clone for FundControl<S> {
    fn clone(&self) -> Self {
        Self {
            fiscal: self.fiscal.clone(),
            obligations: self.obligations.clone(),
            versions: self.versions.clone(),
            workflow: self.workflow.clone(),
            variance: self.variance.clone(),
        }
    }
}

impl<S: FundControlStore> FundControl<S> {
    /// Builds every service over `store`.
    pub fn new(store: Arc<S>, collaborators: Collaborators) -> Self {
        Self {
            fiscal: FiscalLedger::new(Arc::clone(&store), collaborators.clone()),
            obligations: ObligationLedger::new(Arc::clone(&store), collaborators.clone()),
            versions: BudgetVersionStore::new(Arc::clone(&store), collaborators.clone()),
            workflow: ApprovalWorkflowEngine::new(Arc::clone(&store), collaborators),
            variance: VarianceAnalyzer::new(store),
        }
    }

    /// Fiscal years and appropriations.
    #[must_use]
    pub fn fiscal(&self) -> &FiscalLedger<S> {
        &self.fiscal
    }

    /// Obligations and expenditures.
    #[must_use]
    pub fn obligations(&self) -> &ObligationLedger<S> {
        &self.obligations
    }

    /// Budgets and their versions.
    #[must_use]
    pub fn versions(&self) -> &BudgetVersionStore<S> {
        &self.versions
    }

    /// Approval workflows and requests.
    #[must_use]
    pub fn workflow(&self) -> &ApprovalWorkflowEngine<S> {
        &self.workflow
    }

    /// Read-only: would `amount` fit under the appropriation right now?
    ///
    /// # Errors
    ///
    /// See [`FiscalLedger::check_availability`].
    pub async fn check_fund_availability(
        &self,
        appropriation_id: AppropriationId,
        amount: Decimal,
    ) -> Result<AvailabilityCheck, FiscalError> {
        self.fiscal.check_availability(appropriation_id, amount).await
    }

    /// # Errors
    ///
    /// See [`ObligationLedger::create_obligation`].
    pub async fn create_obligation(
        &self,
        input: CreateObligationInput,
        actor: UserId,
    ) -> Result<Obligation, ObligationError> {
        self.obligations.create_obligation(input, actor).await
    }

    /// # Errors
    ///
    /// See [`ObligationLedger::cancel_obligation`].
    pub async fn cancel_obligation(
        &self,
        id: ObligationId,
        actor: UserId,
    ) -> Result<Obligation, ObligationError> {
        self.obligations.cancel_obligation(id, actor).await
    }

    /// # Errors
    ///
    /// See [`ObligationLedger::create_expenditure`].
    pub async fn create_expenditure(
        &self,
        input: CreateExpenditureInput,
        actor: UserId,
    ) -> Result<Expenditure, ObligationError> {
        self.obligations.create_expenditure(input, actor).await
    }

    /// # Errors
    ///
    /// See [`ApprovalWorkflowEngine::submit`].
    pub async fn submit_for_approval(
        &self,
        budget_id: BudgetId,
        submitter: UserId,
    ) -> Result<ApprovalRequest, WorkflowError> {
        self.workflow.submit(budget_id, submitter).await
    }

    /// # Errors
    ///
    /// See [`ApprovalWorkflowEngine::process_step`].
    pub async fn process_approval(
        &self,
        request_id: ApprovalRequestId,
        approver: UserId,
        decision: ApprovalDecision,
        comments: Option<String>,
    ) -> Result<ApprovalRequest, WorkflowError> {
        self.workflow
            .process_step(request_id, approver, decision, comments)
            .await
    }

    /// # Errors
    ///
    /// See [`ApprovalWorkflowEngine::delegate`].
    pub async fn delegate_approval(
        &self,
        request_id: ApprovalRequestId,
        actor: UserId,
        to: UserId,
    ) -> Result<ApprovalRequest, WorkflowError> {
        self.workflow.delegate(request_id, actor, to).await
    }

    /// # Errors
    ///
    /// Returns `RequestNotFound` for unknown requests.
    pub async fn get_approval_history(
        &self,
        request_id: ApprovalRequestId,
    ) -> Result<Vec<ApprovalRecord>, WorkflowError> {
        self.workflow.history(request_id).await
    }

    /// # Errors
    ///
    /// See [`BudgetVersionStore::create_pending_version`].
    pub async fn create_budget_version(
        &self,
        budget_id: BudgetId,
        expected_current: u32,
        changes: BudgetChanges,
        actor: UserId,
    ) -> Result<BudgetVersion, VersionError> {
        self.versions
            .create_pending_version(budget_id, expected_current, changes, actor)
            .await
    }

    /// # Errors
    ///
    /// See [`BudgetVersionStore::rollback`].
    pub async fn rollback_budget(
        &self,
        budget_id: BudgetId,
        target: u32,
        actor: UserId,
    ) -> Result<BudgetVersion, VersionError> {
        self.versions.rollback(budget_id, target, actor).await
    }

    /// # Errors
    ///
    /// Returns `BudgetNotFound` for unknown budgets.
    pub async fn get_version_history(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<BudgetVersion>, VersionError> {
        self.versions.version_history(budget_id).await
    }

    /// # Errors
    ///
    /// Returns `BudgetNotFound` for unknown budgets.
    pub async fn get_variance_summary(
        &self,
        budget_id: BudgetId,
    ) -> Result<VarianceSummary, VersionError> {
        self.variance.summary(budget_id).await
    }
}
