//! Fiscal ledger: fiscal years, appropriations and fund availability.

pub mod error;
pub mod ledger;
pub mod rules;
pub mod types;

#[cfg(test)]
mod rules_props;

pub use error::{ExpiryReason, FiscalError};
pub use ledger::FiscalLedger;
pub use rules::{FundsControl, MONEY_SCALE, fits_money_scale};
pub use types::{
    Appropriation, AvailabilityCheck, ColorOfMoney, CreateAppropriationInput, FiscalYear,
    FiscalYearStatus, FiscalYearTransition, RestrictionFlags,
};
