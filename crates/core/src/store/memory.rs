//! In-memory [`FundControlStore`].
//!
//! A single `tokio::sync::Mutex` guards all state, so every trait method
//! is one critical section and every guarded write is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundctl_shared::types::{
    AppropriationId, ApprovalRequestId, ApprovalWorkflowId, BudgetId, FiscalYearId, ObligationId,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard};

use super::{
    ApprovalUpdate, ApprovalWrite, CancelOutcome, ExpenditureOutcome, FundControlStore,
    PostingOutcome, ReleaseOutcome, ReserveOutcome, StoreError, VersionWrite,
};
use crate::budget::types::{Budget, BudgetStatus, BudgetVersion, VersionState};
use crate::budget::version::VersionChain;
use crate::fiscal::types::{Appropriation, FiscalYear, FiscalYearStatus};
use crate::obligation::types::{Expenditure, Obligation};
use crate::workflow::types::{ApprovalRequest, ApprovalWorkflow};

#[derive(Debug, Default)]
struct State {
    fiscal_years: HashMap<FiscalYearId, FiscalYear>,
    appropriations: HashMap<AppropriationId, Appropriation>,
    budgets: HashMap<BudgetId, Budget>,
    chains: HashMap<BudgetId, VersionChain>,
    obligations: HashMap<ObligationId, Obligation>,
    expenditures: HashMap<ObligationId, Vec<Expenditure>>,
    workflows: HashMap<ApprovalWorkflowId, ApprovalWorkflow>,
    requests: HashMap<ApprovalRequestId, ApprovalRequest>,
    /// Request ids per budget, in creation order.
    budget_requests: HashMap<BudgetId, Vec<ApprovalRequestId>>,
}

/// Process-local store used by tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`
    /// until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    async fn lock(&self) -> Result<MutexGuard<'_, State>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(self.state.lock().await)
    }
}

fn is_locked(fiscal_years: &HashMap<FiscalYearId, FiscalYear>, id: FiscalYearId) -> bool {
    fiscal_years.get(&id).is_some_and(FiscalYear::is_locked)
}

#[async_trait]
impl FundControlStore for MemoryStore {
    async fn insert_fiscal_year(&self, fiscal_year: &FiscalYear) -> Result<(), StoreError> {
        let mut state = self.lock().await?;
        if state.fiscal_years.values().any(|fy| fy.year == fiscal_year.year) {
            return Err(StoreError::Duplicate(format!("fiscal year {}", fiscal_year.year)));
        }
        state.fiscal_years.insert(fiscal_year.id, fiscal_year.clone());
        Ok(())
    }

    async fn fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError> {
        Ok(self.lock().await?.fiscal_years.get(&id).cloned())
    }

    async fn fiscal_years(&self) -> Result<Vec<FiscalYear>, StoreError> {
        let mut years: Vec<_> = self.lock().await?.fiscal_years.values().cloned().collect();
        years.sort_by_key(|fy| fy.year);
        Ok(years)
    }

    async fn transition_fiscal_year(
        &self,
        id: FiscalYearId,
        from: FiscalYearStatus,
        to: FiscalYearStatus,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock().await?;
        match state.fiscal_years.get_mut(&id) {
            Some(fy) if fy.status == from => {
                fy.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_appropriation(&self, appropriation: &Appropriation) -> Result<(), StoreError> {
        let mut state = self.lock().await?;
        if state.appropriations.contains_key(&appropriation.id) {
            return Err(StoreError::Duplicate(format!("appropriation {}", appropriation.id)));
        }
        state
            .appropriations
            .insert(appropriation.id, appropriation.clone());
        Ok(())
    }

    async fn appropriation(
        &self,
        id: AppropriationId,
    ) -> Result<Option<Appropriation>, StoreError> {
        Ok(self.lock().await?.appropriations.get(&id).cloned())
    }

    async fn reserve_funds(
        &self,
        id: AppropriationId,
        amount: Decimal,
    ) -> Result<ReserveOutcome, StoreError> {
        let mut state = self.lock().await?;
        let Some(appropriation) = state.appropriations.get_mut(&id) else {
            return Ok(ReserveOutcome::NotFound);
        };
        if appropriation.obligated + amount > appropriation.appropriated {
            return Ok(ReserveOutcome::Insufficient {
                available: appropriation.available(),
            });
        }
        appropriation.obligated += amount;
        appropriation.updated_at = Utc::now();
        Ok(ReserveOutcome::Reserved {
            obligated: appropriation.obligated,
        })
    }

    async fn release_funds(
        &self,
        id: AppropriationId,
        amount: Decimal,
    ) -> Result<ReleaseOutcome, StoreError> {
        let mut state = self.lock().await?;
        let Some(appropriation) = state.appropriations.get_mut(&id) else {
            return Ok(ReleaseOutcome::NotFound);
        };
        if amount > appropriation.obligated {
            return Ok(ReleaseOutcome::ExceedsObligated {
                obligated: appropriation.obligated,
            });
        }
        appropriation.obligated -= amount;
        appropriation.updated_at = Utc::now();
        Ok(ReleaseOutcome::Released {
            obligated: appropriation.obligated,
        })
    }

    async fn insert_budget(
        &self,
        budget: &Budget,
        version: &BudgetVersion,
    ) -> Result<(), StoreError> {
        let mut state = self.lock().await?;
        if state.budgets.contains_key(&budget.id) {
            return Err(StoreError::Duplicate(format!("budget {}", budget.id)));
        }
        state.budgets.insert(budget.id, budget.clone());
        state
            .chains
            .insert(budget.id, VersionChain::new(version.clone()));
        Ok(())
    }

    async fn budget(&self, id: BudgetId) -> Result<Option<Budget>, StoreError> {
        Ok(self.lock().await?.budgets.get(&id).cloned())
    }

    async fn budget_version(
        &self,
        id: BudgetId,
        number: u32,
    ) -> Result<Option<BudgetVersion>, StoreError> {
        Ok(self
            .lock()
            .await?
            .chains
            .get(&id)
            .and_then(|chain| chain.get(number).cloned()))
    }

    async fn budget_versions(&self, id: BudgetId) -> Result<Vec<BudgetVersion>, StoreError> {
        Ok(self
            .lock()
            .await?
            .chains
            .get(&id)
            .map(|chain| chain.versions().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_draft_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError> {
        let mut state = self.lock().await?;
        let State {
            budgets, chains, ..
        } = &mut *state;
        let (Some(budget), Some(chain)) = (
            budgets.get_mut(&version.budget_id),
            chains.get_mut(&version.budget_id),
        ) else {
            return Ok(VersionWrite::BudgetNotFound);
        };
        if budget.status != BudgetStatus::Draft {
            return Ok(VersionWrite::NotEditable(budget.status));
        }
        if budget.current_version != expected_current {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }

        chain.replace_current(version.clone());
        budget.requested_amount = version.total_amount;
        budget.updated_at = Utc::now();
        Ok(VersionWrite::Written(budget.clone()))
    }

    async fn insert_pending_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError> {
        let mut state = self.lock().await?;
        let State {
            budgets, chains, ..
        } = &mut *state;
        let (Some(budget), Some(chain)) = (
            budgets.get_mut(&version.budget_id),
            chains.get_mut(&version.budget_id),
        ) else {
            return Ok(VersionWrite::BudgetNotFound);
        };
        if budget.current_version != expected_current {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }
        if budget.status == BudgetStatus::UnderReview {
            return Ok(VersionWrite::UnderReview);
        }
        if version.number != chain.next_number() {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }

        chain.push_pending(version.clone());
        budget.requested_amount = version.total_amount;
        budget.updated_at = Utc::now();
        Ok(VersionWrite::Written(budget.clone()))
    }

    async fn append_committed_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError> {
        let mut state = self.lock().await?;
        let State {
            budgets, chains, ..
        } = &mut *state;
        let (Some(budget), Some(chain)) = (
            budgets.get_mut(&version.budget_id),
            chains.get_mut(&version.budget_id),
        ) else {
            return Ok(VersionWrite::BudgetNotFound);
        };
        if budget.current_version != expected_current || version.number != chain.next_number() {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }
        if budget.status == BudgetStatus::UnderReview {
            return Ok(VersionWrite::UnderReview);
        }

        let now = Utc::now();
        if let Some(pending) = chain.pending().map(|v| v.number) {
            chain.discard(pending);
        }
        chain.push_committed(version.clone(), now);
        budget.previous_version = Some(budget.current_version);
        budget.current_version = version.number;
        budget.requested_amount = version.total_amount;
        if budget.status != BudgetStatus::Draft {
            budget.status = BudgetStatus::Approved;
            budget.approved_amount = version.total_amount;
        }
        budget.updated_at = now;
        Ok(VersionWrite::Written(budget.clone()))
    }

    async fn post_obligation(&self, obligation: &Obligation) -> Result<PostingOutcome, StoreError> {
        let mut state = self.lock().await?;
        let State {
            fiscal_years,
            appropriations,
            budgets,
            obligations,
            ..
        } = &mut *state;
        if obligations.contains_key(&obligation.id) {
            return Err(StoreError::Duplicate(format!("obligation {}", obligation.id)));
        }
        if is_locked(fiscal_years, obligation.fiscal_year_id) {
            return Ok(PostingOutcome::FiscalYearLocked);
        }
        let Some(appropriation) = appropriations.get_mut(&obligation.appropriation_id) else {
            return Ok(PostingOutcome::AppropriationNotFound);
        };
        let Some(budget) = budgets.get_mut(&obligation.budget_id) else {
            return Ok(PostingOutcome::BudgetNotFound);
        };
        if appropriation.obligated + obligation.amount > appropriation.appropriated {
            return Ok(PostingOutcome::InsufficientFunds {
                available: appropriation.available(),
            });
        }
        if budget.obligated_amount + obligation.amount > budget.approved_amount {
            return Ok(PostingOutcome::BudgetCeilingExceeded {
                available: budget.unobligated(),
            });
        }

        let now = Utc::now();
        appropriation.obligated += obligation.amount;
        appropriation.updated_at = now;
        budget.obligated_amount += obligation.amount;
        budget.updated_at = now;
        obligations.insert(obligation.id, obligation.clone());
        Ok(PostingOutcome::Posted)
    }

    async fn obligation(&self, id: ObligationId) -> Result<Option<Obligation>, StoreError> {
        Ok(self.lock().await?.obligations.get(&id).cloned())
    }

    async fn budget_obligations(&self, budget_id: BudgetId) -> Result<Vec<Obligation>, StoreError> {
        let mut found: Vec<_> = self
            .lock()
            .await?
            .obligations
            .values()
            .filter(|o| o.budget_id == budget_id)
            .cloned()
            .collect();
        found.sort_by_key(|o| o.created_at);
        Ok(found)
    }

    async fn cancel_obligation(
        &self,
        id: ObligationId,
        at: DateTime<Utc>,
    ) -> Result<CancelOutcome, StoreError> {
        let mut state = self.lock().await?;
        let State {
            fiscal_years,
            appropriations,
            budgets,
            obligations,
            expenditures,
            ..
        } = &mut *state;
        let Some(obligation) = obligations.get_mut(&id) else {
            return Ok(CancelOutcome::NotFound);
        };
        if !obligation.active {
            return Ok(CancelOutcome::AlreadyCancelled);
        }
        if is_locked(fiscal_years, obligation.fiscal_year_id) {
            return Ok(CancelOutcome::FiscalYearLocked);
        }
        let count = expenditures.get(&id).map_or(0, Vec::len);
        if count > 0 {
            return Ok(CancelOutcome::HasExpenditures { count });
        }
        let Some(appropriation) = appropriations.get_mut(&obligation.appropriation_id) else {
            return Err(StoreError::Corrupt(format!(
                "obligation {id} references a missing appropriation"
            )));
        };
        let Some(budget) = budgets.get_mut(&obligation.budget_id) else {
            return Err(StoreError::Corrupt(format!(
                "obligation {id} references a missing budget"
            )));
        };

        appropriation.obligated -= obligation.amount;
        appropriation.updated_at = at;
        budget.obligated_amount -= obligation.amount;
        budget.updated_at = at;
        obligation.active = false;
        obligation.cancelled_at = Some(at);
        Ok(CancelOutcome::Cancelled(obligation.clone()))
    }

    async fn post_expenditure(
        &self,
        expenditure: &Expenditure,
    ) -> Result<ExpenditureOutcome, StoreError> {
        let mut state = self.lock().await?;
        let State {
            fiscal_years,
            budgets,
            obligations,
            expenditures,
            ..
        } = &mut *state;
        let Some(obligation) = obligations.get_mut(&expenditure.obligation_id) else {
            return Ok(ExpenditureOutcome::NotFound);
        };
        if !obligation.active {
            return Ok(ExpenditureOutcome::ObligationInactive);
        }
        if is_locked(fiscal_years, obligation.fiscal_year_id) {
            return Ok(ExpenditureOutcome::FiscalYearLocked);
        }
        if obligation.expended + expenditure.amount > obligation.amount {
            return Ok(ExpenditureOutcome::ExceedsObligation {
                remaining: obligation.remaining(),
            });
        }

        obligation.expended += expenditure.amount;
        if let Some(budget) = budgets.get_mut(&obligation.budget_id) {
            budget.expended_amount += expenditure.amount;
            budget.updated_at = expenditure.created_at;
        }
        expenditures
            .entry(expenditure.obligation_id)
            .or_default()
            .push(expenditure.clone());
        Ok(ExpenditureOutcome::Posted)
    }

    async fn expenditures(
        &self,
        obligation_id: ObligationId,
    ) -> Result<Vec<Expenditure>, StoreError> {
        Ok(self
            .lock()
            .await?
            .expenditures
            .get(&obligation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_workflow(&self, workflow: &ApprovalWorkflow) -> Result<(), StoreError> {
        let mut state = self.lock().await?;
        if state.workflows.contains_key(&workflow.id) {
            return Err(StoreError::Duplicate(format!("workflow {}", workflow.id)));
        }
        state.workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn workflow(
        &self,
        id: ApprovalWorkflowId,
    ) -> Result<Option<ApprovalWorkflow>, StoreError> {
        Ok(self.lock().await?.workflows.get(&id).cloned())
    }

    async fn approval_request(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self.lock().await?.requests.get(&id).cloned())
    }

    async fn latest_budget_request(
        &self,
        budget_id: BudgetId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let state = self.lock().await?;
        Ok(state
            .budget_requests
            .get(&budget_id)
            .and_then(|ids| ids.last())
            .and_then(|id| state.requests.get(id))
            .cloned())
    }

    async fn save_approval(&self, update: &ApprovalUpdate) -> Result<ApprovalWrite, StoreError> {
        let mut state = self.lock().await?;
        let State {
            budgets,
            chains,
            requests,
            budget_requests,
            ..
        } = &mut *state;
        let request = &update.request;

        let stored = requests.get(&request.id);
        match (update.expected_revision, stored) {
            (Some(expected), Some(stored)) if stored.revision != expected => {
                return Ok(ApprovalWrite::RevisionConflict {
                    actual: stored.revision,
                });
            }
            (Some(_), None) => {
                return Ok(ApprovalWrite::RevisionConflict { actual: 0 });
            }
            (None, Some(stored)) => {
                return Ok(ApprovalWrite::RevisionConflict {
                    actual: stored.revision,
                });
            }
            _ => {}
        }

        let (Some(budget), Some(chain)) = (
            budgets.get_mut(&request.budget_id),
            chains.get_mut(&request.budget_id),
        ) else {
            return Ok(ApprovalWrite::BudgetNotFound);
        };
        // A second request may not open while one is under review.
        if update.expected_revision.is_none() && budget.status == BudgetStatus::UnderReview {
            return Ok(ApprovalWrite::RevisionConflict { actual: 0 });
        }

        if let Some(commit) = update.commit {
            if budget.current_version != commit.expected_current {
                return Ok(ApprovalWrite::VersionConflict {
                    expected: commit.expected_current,
                    actual: budget.current_version,
                });
            }
            if !chain
                .get(commit.version)
                .is_some_and(|v| v.state == VersionState::Pending)
            {
                return Ok(ApprovalWrite::VersionNotFound(commit.version));
            }
        }

        let now = Utc::now();
        if let Some(commit) = update.commit {
            chain.commit(commit.version, now);
            budget.previous_version = Some(budget.current_version);
            budget.current_version = commit.version;
            budget.approved_amount = chain.current().total_amount;
        }
        if let Some(number) = update.discard_version {
            chain.discard(number);
        }
        budget.status = update.budget_status;
        budget.updated_at = now;
        let saved = budget.clone();

        if update.expected_revision.is_none() {
            budget_requests
                .entry(request.budget_id)
                .or_default()
                .push(request.id);
        }
        requests.insert(request.id, request.clone());
        Ok(ApprovalWrite::Saved(saved))
    }
}
