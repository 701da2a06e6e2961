//! Storage port for fund control.
//!
//! The services in this crate never read a balance, modify it in
//! application code and write it back. Every balance-changing method on
//! [`FundControlStore`] is a single atomic check-and-apply step, and
//! reports a rejected guard through an outcome enum instead of an error.
//! Errors are reserved for infrastructure faults.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundctl_shared::types::{
    AppropriationId, ApprovalRequestId, ApprovalWorkflowId, BudgetId, FiscalYearId, ObligationId,
};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::budget::types::{Budget, BudgetStatus, BudgetVersion};
use crate::fiscal::types::{Appropriation, FiscalYear, FiscalYearStatus};
use crate::obligation::types::{Expenditure, Obligation};
use crate::workflow::types::{ApprovalRequest, ApprovalWorkflow};

/// Infrastructure failure in the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Persistence layer could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// A record with the same key already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

impl StoreError {
    /// Returns the HTTP-equivalent status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::Corrupt(_) => 500,
            Self::Duplicate(_) => 409,
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "STORE_UNAVAILABLE",
            Self::Corrupt(_) => "STORE_CORRUPT",
            Self::Duplicate(_) => "DUPLICATE_RECORD",
        }
    }
}

/// Outcome of a guarded reservation against an appropriation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Funds reserved; carries the new obligated total.
    Reserved {
        /// Obligated amount after the reservation.
        obligated: Decimal,
    },
    /// `obligated + amount` would exceed `appropriated`.
    Insufficient {
        /// Unobligated balance at the time of the attempt.
        available: Decimal,
    },
    /// Appropriation does not exist.
    NotFound,
}

/// Outcome of releasing a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Funds released; carries the new obligated total.
    Released {
        /// Obligated amount after the release.
        obligated: Decimal,
    },
    /// Release is larger than the obligated amount.
    ExceedsObligated {
        /// Obligated amount at the time of the attempt.
        obligated: Decimal,
    },
    /// Appropriation does not exist.
    NotFound,
}

/// Outcome of posting an obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostingOutcome {
    /// Obligation stored, appropriation and budget totals incremented.
    Posted,
    /// Appropriation headroom is too small.
    InsufficientFunds {
        /// Unobligated balance of the appropriation.
        available: Decimal,
    },
    /// Budget's approved ceiling is too small.
    BudgetCeilingExceeded {
        /// `approved - obligated` on the budget.
        available: Decimal,
    },
    /// Obligation's fiscal year is locked.
    FiscalYearLocked,
    /// Appropriation does not exist.
    AppropriationNotFound,
    /// Budget does not exist.
    BudgetNotFound,
}

/// Outcome of cancelling an obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Obligation marked inactive and its reservation released.
    Cancelled(Obligation),
    /// Obligation was already inactive; nothing was released.
    AlreadyCancelled,
    /// Expenditures exist against the obligation.
    HasExpenditures {
        /// Number of expenditures recorded.
        count: usize,
    },
    /// Obligation's fiscal year is locked.
    FiscalYearLocked,
    /// Obligation does not exist.
    NotFound,
}

/// Outcome of posting an expenditure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpenditureOutcome {
    /// Expenditure stored and totals incremented.
    Posted,
    /// Cumulative expenditures would exceed the obligation amount.
    ExceedsObligation {
        /// Unexpended balance of the obligation.
        remaining: Decimal,
    },
    /// Obligation has been cancelled.
    ObligationInactive,
    /// Obligation's fiscal year is locked.
    FiscalYearLocked,
    /// Obligation does not exist.
    NotFound,
}

/// Outcome of a version-guarded budget write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionWrite {
    /// Write applied; carries the updated budget.
    Written(Budget),
    /// Budget's current version differs from the expected one.
    Conflict {
        /// Current version found in the store.
        actual: u32,
    },
    /// Budget does not exist.
    BudgetNotFound,
    /// Draft edits are only allowed while the budget is a draft.
    NotEditable(BudgetStatus),
    /// A request is under review against the pending version.
    UnderReview,
}

/// Commit instruction carried by an approval update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCommit {
    /// Pending version to make current.
    pub version: u32,
    /// Current version the pending one was built on.
    pub expected_current: u32,
}

/// Atomic write produced by one approval action.
#[derive(Debug, Clone)]
pub struct ApprovalUpdate {
    /// New state of the request.
    pub request: ApprovalRequest,
    /// Revision the request had when it was read; `None` inserts it.
    pub expected_revision: Option<u64>,
    /// Status to give the budget.
    pub budget_status: BudgetStatus,
    /// Version to commit on final approval.
    pub commit: Option<VersionCommit>,
    /// Pending version to discard on rejection.
    pub discard_version: Option<u32>,
}

/// Outcome of saving an approval update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalWrite {
    /// Update applied; carries the updated budget.
    Saved(Budget),
    /// Request changed since it was read, or a new request raced one
    /// already under review.
    RevisionConflict {
        /// Revision found in the store.
        actual: u64,
    },
    /// Budget's current version moved past the expected one.
    VersionConflict {
        /// Expected current version.
        expected: u32,
        /// Current version found in the store.
        actual: u32,
    },
    /// Budget does not exist.
    BudgetNotFound,
    /// Version to commit is missing or no longer pending.
    VersionNotFound(u32),
}

/// Persistence contract for the fund control core.
#[async_trait]
pub trait FundControlStore: Send + Sync {
    // Fiscal years

    /// Inserts a fiscal year.
    async fn insert_fiscal_year(&self, fiscal_year: &FiscalYear) -> Result<(), StoreError>;

    /// Loads a fiscal year.
    async fn fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError>;

    /// Lists all fiscal years ordered by year.
    async fn fiscal_years(&self) -> Result<Vec<FiscalYear>, StoreError>;

    /// Sets the status only if it still equals `from`. Returns false otherwise.
    async fn transition_fiscal_year(
        &self,
        id: FiscalYearId,
        from: FiscalYearStatus,
        to: FiscalYearStatus,
    ) -> Result<bool, StoreError>;

    // Appropriations

    /// Inserts an appropriation.
    async fn insert_appropriation(&self, appropriation: &Appropriation) -> Result<(), StoreError>;

    /// Loads an appropriation.
    async fn appropriation(&self, id: AppropriationId)
    -> Result<Option<Appropriation>, StoreError>;

    /// Atomically increments `obligated` when `obligated + amount <= appropriated`.
    async fn reserve_funds(
        &self,
        id: AppropriationId,
        amount: Decimal,
    ) -> Result<ReserveOutcome, StoreError>;

    /// Atomically decrements `obligated` when `amount <= obligated`.
    async fn release_funds(
        &self,
        id: AppropriationId,
        amount: Decimal,
    ) -> Result<ReleaseOutcome, StoreError>;

    // Budgets and versions

    /// Inserts a budget together with its first version.
    async fn insert_budget(&self, budget: &Budget, version: &BudgetVersion)
    -> Result<(), StoreError>;

    /// Loads a budget.
    async fn budget(&self, id: BudgetId) -> Result<Option<Budget>, StoreError>;

    /// Loads one version of a budget.
    async fn budget_version(
        &self,
        id: BudgetId,
        number: u32,
    ) -> Result<Option<BudgetVersion>, StoreError>;

    /// Lists every version of a budget ordered by number.
    async fn budget_versions(&self, id: BudgetId) -> Result<Vec<BudgetVersion>, StoreError>;

    /// Replaces the current version of a draft budget.
    async fn update_draft_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError>;

    /// Adds a pending version, discarding any other pending version.
    async fn insert_pending_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError>;

    /// Adds a version and makes it current, freezing the previous current one.
    async fn append_committed_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError>;

    // Obligations and expenditures

    /// Reserves appropriation funds, consumes budget ceiling and stores the
    /// obligation in one atomic step. A locked fiscal year refuses it.
    async fn post_obligation(&self, obligation: &Obligation) -> Result<PostingOutcome, StoreError>;

    /// Loads an obligation.
    async fn obligation(&self, id: ObligationId) -> Result<Option<Obligation>, StoreError>;

    /// Lists obligations recorded against a budget.
    async fn budget_obligations(&self, budget_id: BudgetId) -> Result<Vec<Obligation>, StoreError>;

    /// Marks an obligation inactive and releases its reservation unless its
    /// fiscal year is locked.
    async fn cancel_obligation(
        &self,
        id: ObligationId,
        at: DateTime<Utc>,
    ) -> Result<CancelOutcome, StoreError>;

    /// Stores an expenditure when the obligation has enough unexpended
    /// balance and its fiscal year is not locked.
    async fn post_expenditure(
        &self,
        expenditure: &Expenditure,
    ) -> Result<ExpenditureOutcome, StoreError>;

    /// Lists expenditures recorded against an obligation.
    async fn expenditures(&self, obligation_id: ObligationId)
    -> Result<Vec<Expenditure>, StoreError>;

    // Approval workflows

    /// Inserts a workflow template.
    async fn insert_workflow(&self, workflow: &ApprovalWorkflow) -> Result<(), StoreError>;

    /// Loads a workflow template.
    async fn workflow(&self, id: ApprovalWorkflowId)
    -> Result<Option<ApprovalWorkflow>, StoreError>;

    /// Loads an approval request.
    async fn approval_request(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Loads the most recently created request for a budget.
    async fn latest_budget_request(
        &self,
        budget_id: BudgetId,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Applies an approval update atomically.
    async fn save_approval(&self, update: &ApprovalUpdate) -> Result<ApprovalWrite, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_codes() {
        assert_eq!(StoreError::Unavailable("x".into()).status_code(), 503);
        assert_eq!(StoreError::Corrupt("x".into()).status_code(), 500);
        assert_eq!(StoreError::Duplicate("x".into()).error_code(), "DUPLICATE_RECORD");
    }
}
