//! Budget data types.

use chrono::{DateTime, Utc};
use fundctl_shared::types::{
    ApprovalWorkflowId, BudgetId, BudgetLineItemId, FiscalYearId, OrganizationId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Budget status.
///
/// Mirrors the outcome of the latest approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Never submitted; the current version may be edited in place.
    Draft,
    /// A request is in flight.
    UnderReview,
    /// Latest request approved.
    Approved,
    /// Latest request rejected.
    Rejected,
    /// Latest request returned to the submitter.
    Returned,
}

impl BudgetStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "under_review" => Some(Self::UnderReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "returned" => Some(Self::Returned),
            _ => None,
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of one version in a budget's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionState {
    /// Proposed; awaiting approval.
    Pending,
    /// The authoritative version.
    Current,
    /// A former current version. Immutable.
    Frozen,
    /// A pending version that was superseded or rejected.
    Discarded,
}

impl VersionState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Current => "current",
            Self::Frozen => "frozen",
            Self::Discarded => "discarded",
        }
    }

    /// Parses a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "current" => Some(Self::Current),
            "frozen" => Some(Self::Frozen),
            "discarded" => Some(Self::Discarded),
            _ => None,
        }
    }

    /// Current and frozen versions make up the committed history.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Current | Self::Frozen)
    }
}

impl fmt::Display for VersionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a version came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VersionSource {
    /// The budget's first version.
    Draft,
    /// A change proposed against the current version.
    Amendment,
    /// A copy of an earlier version.
    Rollback {
        /// Version whose content was copied.
        from: u32,
    },
}

/// A budget line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLineItem {
    /// Stable identifier, shared by every version that carries the line.
    pub id: BudgetLineItemId,
    /// Spending category.
    pub category: String,
    /// Budgeted amount.
    pub amount: Decimal,
}

/// An immutable snapshot of a budget's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetVersion {
    /// Owning budget.
    pub budget_id: BudgetId,
    /// Version number, unique per budget.
    pub number: u32,
    /// Position in the chain.
    pub state: VersionState,
    /// Budget total.
    pub total_amount: Decimal,
    /// Line items.
    pub line_items: Vec<BudgetLineItem>,
    /// Version this one was derived from.
    pub previous: Option<u32>,
    /// How the version came to exist.
    pub source: VersionSource,
    /// Who created it.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When it became current.
    pub committed_at: Option<DateTime<Utc>>,
}

impl BudgetVersion {
    /// Sum of line item amounts.
    #[must_use]
    pub fn line_item_total(&self) -> Decimal {
        self.line_items.iter().map(|item| item.amount).sum()
    }

    /// Describes a mismatch between line items and the total.
    ///
    /// Line items may be added before totals are final, so a mismatch is
    /// reported, never rejected. A version without line items always
    /// reconciles.
    #[must_use]
    pub fn reconciliation_warning(&self) -> Option<String> {
        if self.line_items.is_empty() {
            return None;
        }
        let line_total = self.line_item_total();
        (line_total != self.total_amount).then(|| {
            format!(
                "line items total {line_total} but budget total is {}",
                self.total_amount
            )
        })
    }

    /// Looks up a line item.
    #[must_use]
    pub fn line_item(&self, id: BudgetLineItemId) -> Option<&BudgetLineItem> {
        self.line_items.iter().find(|item| item.id == id)
    }
}

/// A budget: the head of a chain of versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    /// Unique identifier.
    pub id: BudgetId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Fiscal year.
    pub fiscal_year_id: FiscalYearId,
    /// Display name.
    pub name: String,
    /// Approval template used on submission.
    pub approval_workflow_id: Option<ApprovalWorkflowId>,
    /// Number of the current version.
    pub current_version: u32,
    /// Number of the version that was current before it.
    pub previous_version: Option<u32>,
    /// Status.
    pub status: BudgetStatus,
    /// Total of the latest draft or pending version.
    pub requested_amount: Decimal,
    /// Total of the latest approved version; the obligation ceiling.
    pub approved_amount: Decimal,
    /// Sum of active obligations.
    pub obligated_amount: Decimal,
    /// Sum of expenditures.
    pub expended_amount: Decimal,
    /// Who created it.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Approved ceiling not yet obligated.
    #[must_use]
    pub fn unobligated(&self) -> Decimal {
        self.approved_amount - self.obligated_amount
    }
}

/// A line item to add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    /// Spending category.
    pub category: String,
    /// Budgeted amount.
    pub amount: Decimal,
}

/// Changes applied on top of an existing version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetChanges {
    /// New total; unchanged when `None`.
    pub total_amount: Option<Decimal>,
    /// Line items to add.
    pub add_line_items: Vec<NewLineItem>,
    /// Line items whose amount changes.
    pub update_line_items: Vec<(BudgetLineItemId, Decimal)>,
    /// Line items to remove.
    pub remove_line_items: Vec<BudgetLineItemId>,
}

impl BudgetChanges {
    /// Returns true when nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_amount.is_none()
            && self.add_line_items.is_empty()
            && self.update_line_items.is_empty()
            && self.remove_line_items.is_empty()
    }
}

/// Input for creating a budget.
#[derive(Debug, Clone)]
pub struct CreateBudgetInput {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Fiscal year.
    pub fiscal_year_id: FiscalYearId,
    /// Display name.
    pub name: String,
    /// Approval template used on submission.
    pub approval_workflow_id: Option<ApprovalWorkflowId>,
    /// Requested total.
    pub total_amount: Decimal,
    /// Initial line items.
    pub line_items: Vec<NewLineItem>,
}
