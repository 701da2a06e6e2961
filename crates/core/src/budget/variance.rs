//! Approved vs. obligated vs. expended aggregation.

use fundctl_shared::types::{BudgetId, BudgetLineItemId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::VersionError;
use super::types::{Budget, BudgetVersion};
use crate::obligation::Obligation;
use crate::store::FundControlStore;

/// Obligated and expended amounts for one line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemVariance {
    /// Line item in the current version.
    pub line_item_id: BudgetLineItemId,
    /// Spending category.
    pub category: String,
    /// Budgeted amount.
    pub amount: Decimal,
    /// Active obligations charged to the line item.
    pub obligated: Decimal,
    /// Expenditures against those obligations.
    pub expended: Decimal,
    /// `amount - obligated`; negative when the line is over-obligated.
    pub remaining: Decimal,
}

/// Read-only view of a budget's execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceSummary {
    /// Budget summarized.
    pub budget_id: BudgetId,
    /// Current version number.
    pub version: u32,
    /// Approved ceiling.
    pub approved: Decimal,
    /// Active obligations.
    pub obligated: Decimal,
    /// Expenditures posted.
    pub expended: Decimal,
    /// `approved - obligated`.
    pub unobligated_balance: Decimal,
    /// `obligated - expended`.
    pub unliquidated_obligations: Decimal,
    /// Obligated as a percentage of approved.
    pub obligation_rate: Decimal,
    /// Expended as a percentage of obligated.
    pub expenditure_rate: Decimal,
    /// Per line item of the current version.
    pub line_items: Vec<LineItemVariance>,
    /// Obligated amount not charged to any current line item.
    pub unallocated_obligated: Decimal,
}

/// Builds [`VarianceSummary`] values from stored budgets and obligations.
pub struct VarianceAnalyzer<S> {
    store: Arc<S>,
}

impl<S> Clone for VarianceAnalyzer<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: FundControlStore> VarianceAnalyzer<S> {
    /// Creates an analyzer over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Summarizes a budget as of now.
    ///
    /// # Errors
    ///
    /// Returns `BudgetNotFound` if the budget does not exist.
    pub async fn summary(&self, budget_id: BudgetId) -> Result<VarianceSummary, VersionError> {
        let budget = self
            .store
            .budget(budget_id)
            .await?
            .ok_or(VersionError::BudgetNotFound(budget_id))?;
        let version = self
            .store
            .budget_version(budget_id, budget.current_version)
            .await?
            .ok_or(VersionError::VersionNotFound {
                budget_id,
                version: budget.current_version,
            })?;
        let obligations = self.store.budget_obligations(budget_id).await?;
        Ok(summarize(&budget, &version, &obligations))
    }
}

/// Aggregates active obligations against a budget's current version.
#[must_use]
pub fn summarize(
    budget: &Budget,
    version: &BudgetVersion,
    obligations: &[Obligation],
) -> VarianceSummary {
    let active = || obligations.iter().filter(|o| o.active);
    let obligated: Decimal = active().map(|o| o.amount).sum();
    let expended: Decimal = active().map(|o| o.expended).sum();

    let line_items: Vec<LineItemVariance> = version
        .line_items
        .iter()
        .map(|item| {
            let charged = || active().filter(|o| o.line_item_id == Some(item.id));
            let line_obligated: Decimal = charged().map(|o| o.amount).sum();
            LineItemVariance {
                line_item_id: item.id,
                category: item.category.clone(),
                amount: item.amount,
                obligated: line_obligated,
                expended: charged().map(|o| o.expended).sum(),
                remaining: item.amount - line_obligated,
            }
        })
        .collect();
    let allocated: Decimal = line_items.iter().map(|l| l.obligated).sum();

    VarianceSummary {
        budget_id: budget.id,
        version: version.number,
        approved: budget.approved_amount,
        obligated,
        expended,
        unobligated_balance: budget.approved_amount - obligated,
        unliquidated_obligations: obligated - expended,
        obligation_rate: percent(obligated, budget.approved_amount),
        expenditure_rate: percent(expended, obligated),
        line_items,
        unallocated_obligated: obligated - allocated,
    }
}

fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        (part / whole * Decimal::ONE_HUNDRED).round_dp(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::types::{BudgetLineItem, BudgetStatus, VersionSource, VersionState};
    use chrono::{NaiveDate, Utc};
    use fundctl_shared::types::{
        AppropriationId, FiscalYearId, ObligationId, OrganizationId, UserId,
    };
    use rust_decimal_macros::dec;

    fn budget(approved: Decimal) -> Budget {
        let now = Utc::now();
        Budget {
            id: BudgetId::new(),
            organization_id: OrganizationId::new(),
            fiscal_year_id: FiscalYearId::new(),
            name: "Facilities".into(),
            approval_workflow_id: None,
            current_version: 2,
            previous_version: Some(1),
            status: BudgetStatus::Approved,
            requested_amount: approved,
            approved_amount: approved,
            obligated_amount: Decimal::ZERO,
            expended_amount: Decimal::ZERO,
            created_by: UserId::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn version(budget: &Budget, items: Vec<BudgetLineItem>) -> BudgetVersion {
        BudgetVersion {
            budget_id: budget.id,
            number: 2,
            state: VersionState::Current,
            total_amount: budget.approved_amount,
            line_items: items,
            previous: Some(1),
            source: VersionSource::Amendment,
            created_by: UserId::new(),
            created_at: Utc::now(),
            committed_at: Some(Utc::now()),
        }
    }

    fn obligation(
        budget: &Budget,
        line_item_id: Option<BudgetLineItemId>,
        amount: Decimal,
        expended: Decimal,
        active: bool,
    ) -> Obligation {
        Obligation {
            id: ObligationId::new(),
            budget_id: budget.id,
            appropriation_id: AppropriationId::new(),
            fiscal_year_id: budget.fiscal_year_id,
            line_item_id,
            amount,
            expended,
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            bona_fide_need_override: None,
            active,
            created_by: UserId::new(),
            created_at: Utc::now(),
            cancelled_at: None,
        }
    }

    #[test]
    fn test_summary_ignores_cancelled_obligations() {
        let b = budget(dec!(100000));
        let repairs = BudgetLineItem {
            id: BudgetLineItemId::new(),
            category: "repairs".into(),
            amount: dec!(60000),
        };
        let v = version(&b, vec![repairs.clone()]);
        let obligations = vec![
            obligation(&b, Some(repairs.id), dec!(30000), dec!(12000), true),
            obligation(&b, None, dec!(10000), dec!(0), true),
            obligation(&b, Some(repairs.id), dec!(50000), dec!(0), false),
        ];

        let summary = summarize(&b, &v, &obligations);
        assert_eq!(summary.obligated, dec!(40000));
        assert_eq!(summary.expended, dec!(12000));
        assert_eq!(summary.unobligated_balance, dec!(60000));
        assert_eq!(summary.unliquidated_obligations, dec!(28000));
        assert_eq!(summary.obligation_rate, dec!(40));
        assert_eq!(summary.expenditure_rate, dec!(30));
        assert_eq!(summary.unallocated_obligated, dec!(10000));

        let line = &summary.line_items[0];
        assert_eq!(line.obligated, dec!(30000));
        assert_eq!(line.expended, dec!(12000));
        assert_eq!(line.remaining, dec!(30000));
    }

    #[test]
    fn test_summary_of_unapproved_budget() {
        let b = budget(Decimal::ZERO);
        let summary = summarize(&b, &version(&b, Vec::new()), &[]);
        assert_eq!(summary.obligation_rate, Decimal::ZERO);
        assert_eq!(summary.expenditure_rate, Decimal::ZERO);
        assert!(summary.line_items.is_empty());
    }

    #[test]
    fn test_rates_are_rounded() {
        let b = budget(dec!(3));
        let obligations = vec![obligation(&b, None, dec!(1), dec!(0), true)];
        let summary = summarize(&b, &version(&b, Vec::new()), &obligations);
        assert_eq!(summary.obligation_rate, dec!(33.33));
    }
}
