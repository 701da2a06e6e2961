//! Budget version error types.

use fundctl_shared::types::{BudgetId, BudgetLineItemId, FiscalYearId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::BudgetStatus;
use crate::store::StoreError;

/// Errors raised by the budget version store.
#[derive(Debug, Error)]
pub enum VersionError {
    /// Budget's current version is not the one the caller based its change on.
    #[error("Version conflict on budget {budget_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        /// Budget.
        budget_id: BudgetId,
        /// Version the caller expected to be current.
        expected: u32,
        /// Version actually current.
        actual: u32,
    },

    /// Version does not exist in the committed chain.
    #[error("Version {version} not found for budget {budget_id}")]
    VersionNotFound {
        /// Budget.
        budget_id: BudgetId,
        /// Requested version.
        version: u32,
    },

    /// Budget not found.
    #[error("Budget {0} not found")]
    BudgetNotFound(BudgetId),

    /// Fiscal year not found.
    #[error("Fiscal year {0} not found")]
    FiscalYearNotFound(FiscalYearId),

    /// Only draft budgets may be edited in place.
    #[error("Budget is {0}; only drafts can be edited in place")]
    NotEditable(BudgetStatus),

    /// A request is under review against the pending version.
    #[error("Budget {0} is under review")]
    UnderReview(BudgetId),

    /// Amounts cannot be negative.
    #[error("Amount cannot be negative, got {0}")]
    InvalidAmount(Decimal),

    /// Amount has more decimal places than storage keeps.
    #[error("Amount {0} has more than 4 decimal places")]
    InvalidPrecision(Decimal),

    /// Line item does not exist in the base version.
    #[error("Line item {0} not found")]
    LineItemNotFound(BudgetLineItemId),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VersionError {
    /// Returns the HTTP-equivalent status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount(_) | Self::InvalidPrecision(_) => 400,
            Self::VersionNotFound { .. }
            | Self::BudgetNotFound(_)
            | Self::FiscalYearNotFound(_)
            | Self::LineItemNotFound(_) => 404,
            Self::VersionConflict { .. } | Self::UnderReview(_) => 409,
            Self::NotEditable(_) => 422,
            Self::Store(e) => e.status_code(),
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            Self::BudgetNotFound(_) => "BUDGET_NOT_FOUND",
            Self::FiscalYearNotFound(_) => "FISCAL_YEAR_NOT_FOUND",
            Self::NotEditable(_) => "BUDGET_NOT_EDITABLE",
            Self::UnderReview(_) => "BUDGET_UNDER_REVIEW",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidPrecision(_) => "INVALID_PRECISION",
            Self::LineItemNotFound(_) => "LINE_ITEM_NOT_FOUND",
            Self::Store(e) => e.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_error() {
        let err = VersionError::VersionConflict {
            budget_id: BudgetId::new(),
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "VERSION_CONFLICT");
        assert!(err.to_string().contains("expected version 2, found 3"));
    }

    #[test]
    fn test_not_editable_error() {
        let err = VersionError::NotEditable(BudgetStatus::Approved);
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.to_string(), "Budget is approved; only drafts can be edited in place");
    }
}
