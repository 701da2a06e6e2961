//! Obligation and expenditure types.

use chrono::{DateTime, NaiveDate, Utc};
use fundctl_shared::types::{
    AppropriationId, BudgetId, BudgetLineItemId, ExpenditureId, FiscalYearId, ObligationId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A binding commitment against a budget and an appropriation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// Unique identifier.
    pub id: ObligationId,
    /// Budget whose ceiling the obligation consumes.
    pub budget_id: BudgetId,
    /// Appropriation the funds are reserved from.
    pub appropriation_id: AppropriationId,
    /// Fiscal year of the appropriation.
    pub fiscal_year_id: FiscalYearId,
    /// Optional budget line item the obligation is charged to.
    pub line_item_id: Option<BudgetLineItemId>,
    /// Obligated amount.
    pub amount: Decimal,
    /// Sum of expenditures posted so far. Never exceeds `amount`.
    pub expended: Decimal,
    /// Date the obligation was incurred.
    pub date: NaiveDate,
    /// Justification for an obligation dated outside its fiscal year.
    pub bona_fide_need_override: Option<String>,
    /// False once cancelled.
    pub active: bool,
    /// Who recorded it.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Cancellation timestamp.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Obligation {
    /// Unexpended balance.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.amount - self.expended
    }
}

/// An actual disbursement against an obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expenditure {
    /// Unique identifier.
    pub id: ExpenditureId,
    /// Obligation paid against.
    pub obligation_id: ObligationId,
    /// Disbursed amount.
    pub amount: Decimal,
    /// Disbursement date.
    pub date: NaiveDate,
    /// Who recorded it.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for recording an obligation.
#[derive(Debug, Clone)]
pub struct CreateObligationInput {
    /// Budget to charge.
    pub budget_id: BudgetId,
    /// Appropriation to reserve from.
    pub appropriation_id: AppropriationId,
    /// Optional line item within the budget's current version.
    pub line_item_id: Option<BudgetLineItemId>,
    /// Amount to obligate.
    pub amount: Decimal,
    /// Date incurred.
    pub date: NaiveDate,
    /// Justification that allows a date outside the fiscal year.
    pub bona_fide_need_justification: Option<String>,
}

/// Input for posting an expenditure.
#[derive(Debug, Clone)]
pub struct CreateExpenditureInput {
    /// Obligation to pay against.
    pub obligation_id: ObligationId,
    /// Amount disbursed.
    pub amount: Decimal,
    /// Disbursement date.
    pub date: NaiveDate,
}
