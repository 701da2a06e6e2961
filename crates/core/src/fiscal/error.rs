//! Fiscal ledger error types.

use chrono::NaiveDate;
use fundctl_shared::types::{AppropriationId, FiscalYearId};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::fiscal::types::FiscalYearStatus;
use crate::store::StoreError;

/// Why an appropriation no longer accepts reservations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// The funds expired on the given date.
    PastExpiration(NaiveDate),
    /// The appropriation's fiscal year is locked.
    FiscalYearLocked,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PastExpiration(date) => write!(f, "expired on {date}"),
            Self::FiscalYearLocked => write!(f, "fiscal year is locked"),
        }
    }
}

/// Errors that can occur during fiscal ledger operations.
#[derive(Debug, Error)]
pub enum FiscalError {
    /// Amounts must be strictly positive.
    #[error("Amount must be greater than zero, got {0}")]
    InvalidAmount(Decimal),

    /// Amount has more decimal places than storage keeps.
    #[error("Amount {0} has more than 4 decimal places")]
    InvalidPrecision(Decimal),

    /// The appropriation cannot cover the requested amount.
    #[error("Funds unavailable on appropriation {appropriation_id}: requested {requested}, available {available}, shortfall {shortfall}")]
    FundsUnavailable {
        /// The appropriation checked.
        appropriation_id: AppropriationId,
        /// The amount requested.
        requested: Decimal,
        /// The unobligated balance.
        available: Decimal,
        /// `requested - available`.
        shortfall: Decimal,
    },

    /// The appropriation is expired or its fiscal year is locked.
    #[error("Appropriation {appropriation_id} is expired: {reason}")]
    AppropriationExpired {
        /// The appropriation.
        appropriation_id: AppropriationId,
        /// Why it no longer accepts reservations.
        reason: ExpiryReason,
    },

    /// The appropriation is frozen.
    #[error("Appropriation {0} is frozen")]
    AppropriationFrozen(AppropriationId),

    /// Appropriation not found.
    #[error("Appropriation {0} not found")]
    AppropriationNotFound(AppropriationId),

    /// Fiscal year not found.
    #[error("Fiscal year {0} not found")]
    FiscalYearNotFound(FiscalYearId),

    /// Fiscal year is locked.
    #[error("Fiscal year {0} is locked")]
    FiscalYearLocked(FiscalYearId),

    /// Fiscal year already exists or overlaps another year.
    #[error("Fiscal year {0} overlaps an existing fiscal year")]
    OverlappingYear(i32),

    /// Calendar dates for the year cannot be represented.
    #[error("Invalid fiscal year {0}")]
    InvalidYear(i32),

    /// Attempted a backwards or skipping status change.
    #[error("Invalid fiscal year transition from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status.
        from: FiscalYearStatus,
        /// Attempted status.
        to: FiscalYearStatus,
    },

    /// Another fiscal year is already current.
    #[error("Fiscal year {0} is already current")]
    AnotherYearCurrent(FiscalYearId),

    /// Expiration precedes the start of the fiscal year.
    #[error("Expiration date {0} precedes the fiscal year")]
    InvalidExpiration(NaiveDate),

    /// Releasing more than is obligated.
    #[error("Cannot release {requested} from appropriation {appropriation_id}: only {obligated} obligated")]
    ReleaseExceedsObligated {
        /// The appropriation.
        appropriation_id: AppropriationId,
        /// Amount asked to release.
        requested: Decimal,
        /// Amount currently obligated.
        obligated: Decimal,
    },

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FiscalError {
    /// Returns the HTTP-equivalent status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount(_)
            | Self::InvalidPrecision(_)
            | Self::InvalidYear(_)
            | Self::InvalidExpiration(_)
            | Self::InvalidStatusTransition { .. } => 400,

            Self::AppropriationNotFound(_) | Self::FiscalYearNotFound(_) => 404,

            Self::OverlappingYear(_) | Self::AnotherYearCurrent(_) => 409,

            Self::FundsUnavailable { .. }
            | Self::AppropriationExpired { .. }
            | Self::AppropriationFrozen(_)
            | Self::FiscalYearLocked(_)
            | Self::ReleaseExceedsObligated { .. } => 422,

            Self::Store(e) => e.status_code(),
        }
    }

    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidPrecision(_) => "INVALID_PRECISION",
            Self::FundsUnavailable { .. } => "FUNDS_UNAVAILABLE",
            Self::AppropriationExpired { .. } => "APPROPRIATION_EXPIRED",
            Self::AppropriationFrozen(_) => "APPROPRIATION_FROZEN",
            Self::AppropriationNotFound(_) => "APPROPRIATION_NOT_FOUND",
            Self::FiscalYearNotFound(_) => "FISCAL_YEAR_NOT_FOUND",
            Self::FiscalYearLocked(_) => "FISCAL_YEAR_LOCKED",
            Self::OverlappingYear(_) => "OVERLAPPING_FISCAL_YEAR",
            Self::InvalidYear(_) => "INVALID_FISCAL_YEAR",
            Self::InvalidStatusTransition { .. } => "INVALID_TRANSITION",
            Self::AnotherYearCurrent(_) => "ANOTHER_YEAR_CURRENT",
            Self::InvalidExpiration(_) => "INVALID_EXPIRATION",
            Self::ReleaseExceedsObligated { .. } => "RELEASE_EXCEEDS_OBLIGATED",
            Self::Store(e) => e.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funds_unavailable_error() {
        let err = FiscalError::FundsUnavailable {
            appropriation_id: AppropriationId::new(),
            requested: Decimal::new(50_000, 0),
            available: Decimal::new(40_000, 0),
            shortfall: Decimal::new(10_000, 0),
        };
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "FUNDS_UNAVAILABLE");
        assert!(err.to_string().contains("shortfall 10000"));
    }

    #[test]
    fn test_expired_error_mentions_reason() {
        let err = FiscalError::AppropriationExpired {
            appropriation_id: AppropriationId::new(),
            reason: ExpiryReason::FiscalYearLocked,
        };
        assert_eq!(err.error_code(), "APPROPRIATION_EXPIRED");
        assert!(err.to_string().contains("fiscal year is locked"));
    }

    #[test]
    fn test_store_error_is_infrastructure() {
        let err = FiscalError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.error_code(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn test_not_found_errors() {
        assert_eq!(
            FiscalError::AppropriationNotFound(AppropriationId::new()).status_code(),
            404
        );
        assert_eq!(
            FiscalError::FiscalYearNotFound(FiscalYearId::new()).status_code(),
            404
        );
    }
}
