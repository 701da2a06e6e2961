//! `SeaORM` entities for the fund control schema.

pub mod appropriations;
pub mod approval_requests;
pub mod approval_workflows;
pub mod audit_records;
pub mod budget_versions;
pub mod budgets;
pub mod expenditures;
pub mod fiscal_years;
pub mod obligations;

pub mod prelude {
    //! Entity aliases.

    pub use super::appropriations::Entity as Appropriations;
    pub use super::approval_requests::Entity as ApprovalRequests;
    pub use super::approval_workflows::Entity as ApprovalWorkflows;
    pub use super::audit_records::Entity as AuditRecords;
    pub use super::budget_versions::Entity as BudgetVersions;
    pub use super::budgets::Entity as Budgets;
    pub use super::expenditures::Entity as Expenditures;
    pub use super::fiscal_years::Entity as FiscalYears;
    pub use super::obligations::Entity as Obligations;
}
