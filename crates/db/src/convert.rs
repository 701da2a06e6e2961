//! Conversions between entity models and domain types.
//!
//! Enum columns are stored as their string form and parsed back on read;
//! an unknown value is reported as [`StoreError::Corrupt`]. Version
//! numbers and levels are unsigned in the domain and signed in Postgres.

use sea_orm::{ActiveValue::Set, DbErr, SqlErr};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;

use fundctl_core::audit::AuditRecord;
use fundctl_core::budget::{Budget, BudgetStatus, BudgetVersion, VersionState};
use fundctl_core::fiscal::{
    Appropriation, ColorOfMoney, FiscalYear, FiscalYearStatus, RestrictionFlags,
};
use fundctl_core::obligation::{Expenditure, Obligation};
use fundctl_core::store::StoreError;
use fundctl_core::workflow::{ApprovalRequest, ApprovalStatus, ApprovalWorkflow};
use fundctl_shared::types::{
    AppropriationId, ApprovalRequestId, ApprovalWorkflowId, BudgetId, BudgetLineItemId,
    ExpenditureId, FiscalYearId, ObligationId, OrganizationId, UserId,
};

use crate::entities::{
    appropriations, approval_requests, approval_workflows, audit_records, budget_versions,
    budgets, expenditures, fiscal_years, obligations,
};

/// Maps a database error onto the storage port's error.
pub(crate) fn store_err(err: DbErr) -> StoreError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
        return StoreError::Duplicate(detail);
    }
    match err {
        DbErr::Type(msg) | DbErr::Json(msg) => StoreError::Corrupt(msg),
        DbErr::TryIntoErr { from, into, .. } => {
            StoreError::Corrupt(format!("cannot convert {from} into {into}"))
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

fn corrupt(what: &str, value: impl Display) -> StoreError {
    StoreError::Corrupt(format!("invalid {what}: {value}"))
}

pub(crate) fn to_i32(n: u32) -> Result<i32, StoreError> {
    i32::try_from(n).map_err(|_| corrupt("version number", n))
}

pub(crate) fn to_u32(n: i32) -> Result<u32, StoreError> {
    u32::try_from(n).map_err(|_| corrupt("version number", n))
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn from_json<T: DeserializeOwned>(what: &str, value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| corrupt(what, e))
}

// Fiscal years

impl From<&FiscalYear> for fiscal_years::ActiveModel {
    fn from(fy: &FiscalYear) -> Self {
        Self {
            id: Set(fy.id.into_inner()),
            year: Set(fy.year),
            start_date: Set(fy.start_date),
            end_date: Set(fy.end_date),
            status: Set(fy.status.as_str().to_string()),
        }
    }
}

impl TryFrom<fiscal_years::Model> for FiscalYear {
    type Error = StoreError;

    fn try_from(m: fiscal_years::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: FiscalYearId::from_uuid(m.id),
            year: m.year,
            start_date: m.start_date,
            end_date: m.end_date,
            status: FiscalYearStatus::parse(&m.status)
                .ok_or_else(|| corrupt("fiscal year status", &m.status))?,
        })
    }
}

// Appropriations

impl From<&Appropriation> for appropriations::ActiveModel {
    fn from(a: &Appropriation) -> Self {
        Self {
            id: Set(a.id.into_inner()),
            fiscal_year_id: Set(a.fiscal_year_id.into_inner()),
            color_of_money: Set(a.color.as_str().to_string()),
            appropriated: Set(a.appropriated),
            obligated: Set(a.obligated),
            expiration_date: Set(a.expiration_date),
            frozen: Set(a.restrictions.frozen),
            multi_year: Set(a.restrictions.multi_year),
            created_at: Set(a.created_at),
            updated_at: Set(a.updated_at),
        }
    }
}

impl TryFrom<appropriations::Model> for Appropriation {
    type Error = StoreError;

    fn try_from(m: appropriations::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AppropriationId::from_uuid(m.id),
            fiscal_year_id: FiscalYearId::from_uuid(m.fiscal_year_id),
            color: ColorOfMoney::parse(&m.color_of_money)
                .ok_or_else(|| corrupt("color of money", &m.color_of_money))?,
            appropriated: m.appropriated,
            obligated: m.obligated,
            expiration_date: m.expiration_date,
            restrictions: RestrictionFlags {
                frozen: m.frozen,
                multi_year: m.multi_year,
            },
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

// Budgets

impl TryFrom<&Budget> for budgets::ActiveModel {
    type Error = StoreError;

    fn try_from(b: &Budget) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Set(b.id.into_inner()),
            organization_id: Set(b.organization_id.into_inner()),
            fiscal_year_id: Set(b.fiscal_year_id.into_inner()),
            name: Set(b.name.clone()),
            approval_workflow_id: Set(b.approval_workflow_id.map(ApprovalWorkflowId::into_inner)),
            current_version: Set(to_i32(b.current_version)?),
            previous_version: Set(b.previous_version.map(to_i32).transpose()?),
            status: Set(b.status.as_str().to_string()),
            requested_amount: Set(b.requested_amount),
            approved_amount: Set(b.approved_amount),
            obligated_amount: Set(b.obligated_amount),
            expended_amount: Set(b.expended_amount),
            created_by: Set(b.created_by.into_inner()),
            created_at: Set(b.created_at),
            updated_at: Set(b.updated_at),
        })
    }
}

impl TryFrom<budgets::Model> for Budget {
    type Error = StoreError;

    fn try_from(m: budgets::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: BudgetId::from_uuid(m.id),
            organization_id: OrganizationId::from_uuid(m.organization_id),
            fiscal_year_id: FiscalYearId::from_uuid(m.fiscal_year_id),
            name: m.name,
            approval_workflow_id: m.approval_workflow_id.map(ApprovalWorkflowId::from_uuid),
            current_version: to_u32(m.current_version)?,
            previous_version: m.previous_version.map(to_u32).transpose()?,
            status: BudgetStatus::parse(&m.status)
                .ok_or_else(|| corrupt("budget status", &m.status))?,
            requested_amount: m.requested_amount,
            approved_amount: m.approved_amount,
            obligated_amount: m.obligated_amount,
            expended_amount: m.expended_amount,
            created_by: UserId::from_uuid(m.created_by),
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

impl TryFrom<&BudgetVersion> for budget_versions::ActiveModel {
    type Error = StoreError;

    fn try_from(v: &BudgetVersion) -> Result<Self, Self::Error> {
        Ok(Self {
            budget_id: Set(v.budget_id.into_inner()),
            version_number: Set(to_i32(v.number)?),
            state: Set(v.state.as_str().to_string()),
            total_amount: Set(v.total_amount),
            line_items: Set(to_json(&v.line_items)?),
            previous_version: Set(v.previous.map(to_i32).transpose()?),
            source: Set(to_json(&v.source)?),
            created_by: Set(v.created_by.into_inner()),
            created_at: Set(v.created_at),
            committed_at: Set(v.committed_at),
        })
    }
}

impl TryFrom<budget_versions::Model> for BudgetVersion {
    type Error = StoreError;

    fn try_from(m: budget_versions::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            budget_id: BudgetId::from_uuid(m.budget_id),
            number: to_u32(m.version_number)?,
            state: VersionState::parse(&m.state)
                .ok_or_else(|| corrupt("version state", &m.state))?,
            total_amount: m.total_amount,
            line_items: from_json("line items", m.line_items)?,
            previous: m.previous_version.map(to_u32).transpose()?,
            source: from_json("version source", m.source)?,
            created_by: UserId::from_uuid(m.created_by),
            created_at: m.created_at,
            committed_at: m.committed_at,
        })
    }
}

// Obligations and expenditures

impl From<&Obligation> for obligations::ActiveModel {
    fn from(o: &Obligation) -> Self {
        Self {
            id: Set(o.id.into_inner()),
            budget_id: Set(o.budget_id.into_inner()),
            appropriation_id: Set(o.appropriation_id.into_inner()),
            fiscal_year_id: Set(o.fiscal_year_id.into_inner()),
            line_item_id: Set(o.line_item_id.map(BudgetLineItemId::into_inner)),
            amount: Set(o.amount),
            expended: Set(o.expended),
            obligation_date: Set(o.date),
            bona_fide_need_override: Set(o.bona_fide_need_override.clone()),
            active: Set(o.active),
            created_by: Set(o.created_by.into_inner()),
            created_at: Set(o.created_at),
            cancelled_at: Set(o.cancelled_at),
        }
    }
}

impl From<obligations::Model> for Obligation {
    fn from(m: obligations::Model) -> Self {
        Self {
            id: ObligationId::from_uuid(m.id),
            budget_id: BudgetId::from_uuid(m.budget_id),
            appropriation_id: AppropriationId::from_uuid(m.appropriation_id),
            fiscal_year_id: FiscalYearId::from_uuid(m.fiscal_year_id),
            line_item_id: m.line_item_id.map(BudgetLineItemId::from_uuid),
            amount: m.amount,
            expended: m.expended,
            date: m.obligation_date,
            bona_fide_need_override: m.bona_fide_need_override,
            active: m.active,
            created_by: UserId::from_uuid(m.created_by),
            created_at: m.created_at,
            cancelled_at: m.cancelled_at,
        }
    }
}

impl From<&Expenditure> for expenditures::ActiveModel {
    fn from(e: &Expenditure) -> Self {
        Self {
            id: Set(e.id.into_inner()),
            obligation_id: Set(e.obligation_id.into_inner()),
            amount: Set(e.amount),
            expenditure_date: Set(e.date),
            created_by: Set(e.created_by.into_inner()),
            created_at: Set(e.created_at),
        }
    }
}

impl From<expenditures::Model> for Expenditure {
    fn from(m: expenditures::Model) -> Self {
        Self {
            id: ExpenditureId::from_uuid(m.id),
            obligation_id: ObligationId::from_uuid(m.obligation_id),
            amount: m.amount,
            date: m.expenditure_date,
            created_by: UserId::from_uuid(m.created_by),
            created_at: m.created_at,
        }
    }
}

// Approval workflows and requests

impl TryFrom<&ApprovalWorkflow> for approval_workflows::ActiveModel {
    type Error = StoreError;

    fn try_from(w: &ApprovalWorkflow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Set(w.id.into_inner()),
            name: Set(w.name.clone()),
            steps: Set(to_json(&w.steps)?),
        })
    }
}

impl TryFrom<approval_workflows::Model> for ApprovalWorkflow {
    type Error = StoreError;

    fn try_from(m: approval_workflows::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ApprovalWorkflowId::from_uuid(m.id),
            name: m.name,
            steps: from_json("workflow steps", m.steps)?,
        })
    }
}

impl TryFrom<&ApprovalRequest> for approval_requests::ActiveModel {
    type Error = StoreError;

    fn try_from(r: &ApprovalRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Set(r.id.into_inner()),
            workflow_id: Set(r.workflow_id.into_inner()),
            budget_id: Set(r.budget_id.into_inner()),
            version_number: Set(to_i32(r.version)?),
            amount: Set(r.amount),
            status: Set(r.status.as_str().to_string()),
            review_level: Set(r.status.level().map(i16::from)),
            delegated_to: Set(r.delegated_to.map(UserId::into_inner)),
            due_at: Set(r.due_at),
            submitted_by: Set(r.submitted_by.into_inner()),
            records: Set(to_json(&r.records)?),
            revision: Set(i64::try_from(r.revision).map_err(|_| corrupt("revision", r.revision))?),
            created_at: Set(r.created_at),
            updated_at: Set(r.updated_at),
        })
    }
}

impl TryFrom<approval_requests::Model> for ApprovalRequest {
    type Error = StoreError;

    fn try_from(m: approval_requests::Model) -> Result<Self, Self::Error> {
        let level = m
            .review_level
            .map(|l| u8::try_from(l).map_err(|_| corrupt("review level", l)))
            .transpose()?;
        Ok(Self {
            id: ApprovalRequestId::from_uuid(m.id),
            workflow_id: ApprovalWorkflowId::from_uuid(m.workflow_id),
            budget_id: BudgetId::from_uuid(m.budget_id),
            version: to_u32(m.version_number)?,
            amount: m.amount,
            status: ApprovalStatus::from_parts(&m.status, level)
                .ok_or_else(|| corrupt("approval status", &m.status))?,
            delegated_to: m.delegated_to.map(UserId::from_uuid),
            due_at: m.due_at,
            submitted_by: UserId::from_uuid(m.submitted_by),
            records: from_json("approval records", m.records)?,
            revision: u64::try_from(m.revision).map_err(|_| corrupt("revision", m.revision))?,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

// Audit

impl From<&AuditRecord> for audit_records::ActiveModel {
    fn from(r: &AuditRecord) -> Self {
        Self {
            id: Set(r.id.into_inner()),
            actor: Set(r.actor.map(UserId::into_inner)),
            action: Set(r.action.as_str().to_string()),
            entity_type: Set(r.entity_type.as_str().to_string()),
            entity_id: Set(r.entity_id),
            before_state: Set(r.before.clone()),
            after_state: Set(r.after.clone()),
            occurred_at: Set(r.occurred_at),
        }
    }
}
