//! Obligations and expenditures.

pub mod error;
pub mod ledger;
pub mod types;

pub use error::ObligationError;
pub use ledger::ObligationLedger;
pub use types::{CreateExpenditureInput, CreateObligationInput, Expenditure, Obligation};
