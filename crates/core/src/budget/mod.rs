//! Budgets, their version chains and variance reporting.

pub mod error;
pub mod service;
pub mod types;
pub mod variance;
pub mod version;

pub use error::VersionError;
pub use service::BudgetVersionStore;
pub use types::{
    Budget, BudgetChanges, BudgetLineItem, BudgetStatus, BudgetVersion, CreateBudgetInput,
    NewLineItem, VersionSource, VersionState,
};
pub use variance::{LineItemVariance, VarianceAnalyzer, VarianceSummary};
pub use version::VersionChain;
