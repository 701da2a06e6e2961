//! Obligation ledger error types.

use chrono::NaiveDate;
use fundctl_shared::types::{BudgetId, BudgetLineItemId, ObligationId};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::fiscal::FiscalError;
use crate::store::StoreError;

/// Errors that can occur while recording obligations and expenditures.
#[derive(Debug, Error)]
pub enum ObligationError {
    /// Amounts must be strictly positive.
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    /// Amount has more decimal places than storage keeps.
    #[error("Amount {0} has more than 4 decimal places")]
    InvalidPrecision(Decimal),

    /// Obligation date falls outside the appropriation's fiscal year.
    #[error("Obligation date {date} is outside fiscal year {start} to {end}")]
    BonaFideNeedViolation {
        /// Obligation date.
        date: NaiveDate,
        /// First day of the fiscal year.
        start: NaiveDate,
        /// Last day of the fiscal year.
        end: NaiveDate,
    },

    /// Cancellation refused because money was already disbursed.
    #[error("Obligation {id} has {count} expenditure(s) and cannot be cancelled")]
    ObligationHasExpenditures {
        /// Obligation.
        id: ObligationId,
        /// Number of expenditures.
        count: usize,
    },

    /// Expenditure would push cumulative spending past the obligation.
    #[error("Expenditure of {requested} exceeds remaining obligation balance {remaining}")]
    ExpenditureExceedsObligation {
        /// Amount asked for.
        requested: Decimal,
        /// Unexpended balance.
        remaining: Decimal,
    },

    /// Expenditure against a cancelled obligation.
    #[error("Obligation {0} is cancelled")]
    ObligationCancelled(ObligationId),

    /// Cancelling an obligation that is already cancelled.
    #[error("Obligation {0} is already cancelled")]
    InvalidTransition(ObligationId),

    /// Expenditure dated before the obligation.
    #[error("Expenditure date {date} precedes obligation date {obligation_date}")]
    ExpenditureBeforeObligation {
        /// Expenditure date.
        date: NaiveDate,
        /// Obligation date.
        obligation_date: NaiveDate,
    },

    /// Obligation would exceed the budget's approved ceiling.
    #[error("Budget {budget_id} ceiling exceeded: requested {requested}, available {available}, shortfall {shortfall}")]
    BudgetCeilingExceeded {
        /// Budget.
        budget_id: BudgetId,
        /// Amount asked for.
        requested: Decimal,
        /// Approved but unobligated amount.
        available: Decimal,
        /// `requested - available`.
        shortfall: Decimal,
    },

    /// Budget not found.
    #[error("Budget {0} not found")]
    BudgetNotFound(BudgetId),

    /// Line item not in the budget's current version.
    #[error("Line item {0} not found in the current budget version")]
    LineItemNotFound(BudgetLineItemId),

    /// Obligation not found.
    #[error("Obligation {0} not found")]
    ObligationNotFound(ObligationId),

    /// Fund control failure on the fiscal ledger.
    #[error(transparent)]
    Fiscal(#[from] FiscalError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ObligationError {
    /// Returns the HTTP-equivalent status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount(_) | Self::InvalidPrecision(_) => 400,

            Self::BudgetNotFound(_) | Self::LineItemNotFound(_) | Self::ObligationNotFound(_) => {
                404
            }

            Self::InvalidTransition(_) => 409,

            Self::BonaFideNeedViolation { .. }
            | Self::ObligationHasExpenditures { .. }
            | Self::ExpenditureExceedsObligation { .. }
            | Self::ObligationCancelled(_)
            | Self::ExpenditureBeforeObligation { .. }
            | Self::BudgetCeilingExceeded { .. } => 422,

            Self::Fiscal(e) => e.status_code(),
            Self::Store(e) => e.status_code(),
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidPrecision(_) => "INVALID_PRECISION",
            Self::BonaFideNeedViolation { .. } => "BONA_FIDE_NEED_VIOLATION",
            Self::ObligationHasExpenditures { .. } => "OBLIGATION_HAS_EXPENDITURES",
            Self::ExpenditureExceedsObligation { .. } => "EXPENDITURE_EXCEEDS_OBLIGATION",
            Self::ObligationCancelled(_) => "OBLIGATION_CANCELLED",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::ExpenditureBeforeObligation { .. } => "EXPENDITURE_BEFORE_OBLIGATION",
            Self::BudgetCeilingExceeded { .. } => "BUDGET_CEILING_EXCEEDED",
            Self::BudgetNotFound(_) => "BUDGET_NOT_FOUND",
            Self::LineItemNotFound(_) => "LINE_ITEM_NOT_FOUND",
            Self::ObligationNotFound(_) => "OBLIGATION_NOT_FOUND",
            Self::Fiscal(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
        }
    }
}
