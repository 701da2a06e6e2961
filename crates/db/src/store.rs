//! PostgreSQL implementation of [`FundControlStore`].
//!
//! Every balance-changing method runs in one transaction. Rows whose
//! balances are checked are locked with `SELECT ... FOR UPDATE` before the
//! check, and the locks are always taken in the order obligation,
//! appropriation, budget. Obligation and expenditure writes also hold the
//! fiscal year row `FOR SHARE`, so a concurrent lock waits for them and
//! they see a lock that committed first. Reservations and releases use a
//! single guarded `UPDATE` whose `WHERE` clause carries the balance check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::Expr,
};
use tracing::{debug, warn};

use fundctl_core::budget::{Budget, BudgetStatus, BudgetVersion, VersionChain, VersionState};
use fundctl_core::fiscal::{Appropriation, FiscalYear, FiscalYearStatus};
use fundctl_core::obligation::{Expenditure, Obligation};
use fundctl_core::store::{
    ApprovalUpdate, ApprovalWrite, CancelOutcome, ExpenditureOutcome, FundControlStore,
    PostingOutcome, ReleaseOutcome, ReserveOutcome, StoreError, VersionWrite,
};
use fundctl_core::workflow::{ApprovalRequest, ApprovalWorkflow};
use fundctl_shared::types::{
    AppropriationId, ApprovalRequestId, ApprovalWorkflowId, BudgetId, FiscalYearId, ObligationId,
};

use crate::convert::{store_err, to_i32};
use crate::entities::{
    appropriations, approval_requests, approval_workflows, budget_versions, budgets,
    expenditures, fiscal_years, obligations,
};

/// Fund control store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Creates a store over an open connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn begin(&self) -> Result<DatabaseTransaction, StoreError> {
        self.db.begin().await.map_err(store_err)
    }
}

async fn commit_txn(txn: DatabaseTransaction) -> Result<(), StoreError> {
    txn.commit().await.map_err(store_err)
}

async fn lock_budget(
    txn: &DatabaseTransaction,
    id: BudgetId,
) -> Result<Option<Budget>, StoreError> {
    budgets::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(store_err)?
        .map(Budget::try_from)
        .transpose()
}

/// Holds the fiscal year row `FOR SHARE` and reports whether it is locked.
async fn fiscal_year_locked(
    txn: &DatabaseTransaction,
    id: FiscalYearId,
) -> Result<bool, StoreError> {
    let fiscal_year = fiscal_years::Entity::find_by_id(id.into_inner())
        .lock_shared()
        .one(txn)
        .await
        .map_err(store_err)?
        .map(FiscalYear::try_from)
        .transpose()?;
    Ok(fiscal_year.is_some_and(|fy| fy.is_locked()))
}

async fn lock_appropriation(
    txn: &DatabaseTransaction,
    id: AppropriationId,
) -> Result<Option<Appropriation>, StoreError> {
    appropriations::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(store_err)?
        .map(Appropriation::try_from)
        .transpose()
}

async fn lock_obligation(
    txn: &DatabaseTransaction,
    id: ObligationId,
) -> Result<Option<Obligation>, StoreError> {
    Ok(obligations::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(store_err)?
        .map(Obligation::from))
}

async fn load_versions<C: sea_orm::ConnectionTrait>(
    conn: &C,
    id: BudgetId,
) -> Result<Vec<BudgetVersion>, StoreError> {
    budget_versions::Entity::find()
        .filter(budget_versions::Column::BudgetId.eq(id.into_inner()))
        .order_by_asc(budget_versions::Column::VersionNumber)
        .all(conn)
        .await
        .map_err(store_err)?
        .into_iter()
        .map(BudgetVersion::try_from)
        .collect()
}

/// Loads the version chain of a budget whose row is already locked.
async fn load_chain(txn: &DatabaseTransaction, id: BudgetId) -> Result<VersionChain, StoreError> {
    VersionChain::from_versions(load_versions(txn, id).await?).ok_or_else(|| {
        StoreError::Corrupt(format!("budget {id} has no single current version"))
    })
}

/// Writes every version that differs between `before` and `after`.
///
/// Demotions are written first so the partial unique indexes on current
/// and pending versions never see two rows at once.
async fn save_chain(
    txn: &DatabaseTransaction,
    before: &VersionChain,
    after: &VersionChain,
) -> Result<(), StoreError> {
    let mut changed: Vec<&BudgetVersion> = after
        .versions()
        .filter(|v| before.get(v.number) != Some(*v))
        .collect();
    changed.sort_by_key(|v| matches!(v.state, VersionState::Current | VersionState::Pending));

    for version in changed {
        let model = budget_versions::ActiveModel::try_from(version)?;
        if before.get(version.number).is_some() {
            model.update(txn).await.map_err(store_err)?;
        } else {
            model.insert(txn).await.map_err(store_err)?;
        }
    }
    Ok(())
}

async fn save_budget(txn: &DatabaseTransaction, budget: &Budget) -> Result<(), StoreError> {
    budgets::ActiveModel::try_from(budget)?
        .update(txn)
        .await
        .map_err(store_err)?;
    Ok(())
}

#[async_trait]
impl FundControlStore for PgStore {
    async fn insert_fiscal_year(&self, fiscal_year: &FiscalYear) -> Result<(), StoreError> {
        fiscal_years::ActiveModel::from(fiscal_year)
            .insert(&self.db)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn fiscal_year(&self, id: FiscalYearId) -> Result<Option<FiscalYear>, StoreError> {
        fiscal_years::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(FiscalYear::try_from)
            .transpose()
    }

    async fn fiscal_years(&self) -> Result<Vec<FiscalYear>, StoreError> {
        fiscal_years::Entity::find()
            .order_by_asc(fiscal_years::Column::Year)
            .all(&self.db)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(FiscalYear::try_from)
            .collect()
    }

    async fn transition_fiscal_year(
        &self,
        id: FiscalYearId,
        from: FiscalYearStatus,
        to: FiscalYearStatus,
    ) -> Result<bool, StoreError> {
        let result = fiscal_years::Entity::update_many()
            .col_expr(fiscal_years::Column::Status, Expr::value(to.as_str()))
            .filter(fiscal_years::Column::Id.eq(id.into_inner()))
            .filter(fiscal_years::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected == 1)
    }

    async fn insert_appropriation(&self, appropriation: &Appropriation) -> Result<(), StoreError> {
        appropriations::ActiveModel::from(appropriation)
            .insert(&self.db)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn appropriation(
        &self,
        id: AppropriationId,
    ) -> Result<Option<Appropriation>, StoreError> {
        appropriations::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(Appropriation::try_from)
            .transpose()
    }

    async fn reserve_funds(
        &self,
        id: AppropriationId,
        amount: Decimal,
    ) -> Result<ReserveOutcome, StoreError> {
        use appropriations::Column;

        let txn = self.begin().await?;
        let result = appropriations::Entity::update_many()
            .col_expr(Column::Obligated, Expr::col(Column::Obligated).add(amount))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id.into_inner()))
            .filter(Expr::col(Column::Obligated).lte(Expr::col(Column::Appropriated).sub(amount)))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        let row = appropriations::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await
            .map_err(store_err)?;
        let outcome = match (result.rows_affected, row) {
            (_, None) => ReserveOutcome::NotFound,
            (0, Some(row)) => ReserveOutcome::Insufficient {
                available: row.appropriated - row.obligated,
            },
            (_, Some(row)) => ReserveOutcome::Reserved {
                obligated: row.obligated,
            },
        };
        commit_txn(txn).await?;
        Ok(outcome)
    }

    async fn release_funds(
        &self,
        id: AppropriationId,
        amount: Decimal,
    ) -> Result<ReleaseOutcome, StoreError> {
        use appropriations::Column;

        let txn = self.begin().await?;
        let result = appropriations::Entity::update_many()
            .col_expr(Column::Obligated, Expr::col(Column::Obligated).sub(amount))
            .col_expr(Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(Column::Id.eq(id.into_inner()))
            .filter(Column::Obligated.gte(amount))
            .exec(&txn)
            .await
            .map_err(store_err)?;
        let row = appropriations::Entity::find_by_id(id.into_inner())
            .one(&txn)
            .await
            .map_err(store_err)?;
        let outcome = match (result.rows_affected, row) {
            (_, None) => ReleaseOutcome::NotFound,
            (0, Some(row)) => ReleaseOutcome::ExceedsObligated {
                obligated: row.obligated,
            },
            (_, Some(row)) => ReleaseOutcome::Released {
                obligated: row.obligated,
            },
        };
        commit_txn(txn).await?;
        Ok(outcome)
    }

    async fn insert_budget(
        &self,
        budget: &Budget,
        version: &BudgetVersion,
    ) -> Result<(), StoreError> {
        let chain = VersionChain::new(version.clone());
        let txn = self.begin().await?;
        budgets::ActiveModel::try_from(budget)?
            .insert(&txn)
            .await
            .map_err(store_err)?;
        budget_versions::ActiveModel::try_from(chain.current())?
            .insert(&txn)
            .await
            .map_err(store_err)?;
        commit_txn(txn).await
    }

    async fn budget(&self, id: BudgetId) -> Result<Option<Budget>, StoreError> {
        budgets::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(Budget::try_from)
            .transpose()
    }

    async fn budget_version(
        &self,
        id: BudgetId,
        number: u32,
    ) -> Result<Option<BudgetVersion>, StoreError> {
        budget_versions::Entity::find_by_id((id.into_inner(), to_i32(number)?))
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(BudgetVersion::try_from)
            .transpose()
    }

    async fn budget_versions(&self, id: BudgetId) -> Result<Vec<BudgetVersion>, StoreError> {
        load_versions(&self.db, id).await
    }

    async fn update_draft_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError> {
        let txn = self.begin().await?;
        let Some(mut budget) = lock_budget(&txn, version.budget_id).await? else {
            return Ok(VersionWrite::BudgetNotFound);
        };
        if budget.status != BudgetStatus::Draft {
            return Ok(VersionWrite::NotEditable(budget.status));
        }
        if budget.current_version != expected_current {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }

        let before = load_chain(&txn, budget.id).await?;
        let mut chain = before.clone();
        chain.replace_current(version.clone());
        save_chain(&txn, &before, &chain).await?;

        budget.requested_amount = version.total_amount;
        budget.updated_at = Utc::now();
        save_budget(&txn, &budget).await?;
        commit_txn(txn).await?;
        Ok(VersionWrite::Written(budget))
    }

    async fn insert_pending_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError> {
        let txn = self.begin().await?;
        let Some(mut budget) = lock_budget(&txn, version.budget_id).await? else {
            return Ok(VersionWrite::BudgetNotFound);
        };
        if budget.current_version != expected_current {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }
        if budget.status == BudgetStatus::UnderReview {
            return Ok(VersionWrite::UnderReview);
        }

        let before = load_chain(&txn, budget.id).await?;
        if version.number != before.next_number() {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }
        let mut chain = before.clone();
        if let Some(discarded) = chain.push_pending(version.clone()) {
            debug!(budget_id = %budget.id, version = discarded, "pending version discarded");
        }
        save_chain(&txn, &before, &chain).await?;

        budget.requested_amount = version.total_amount;
        budget.updated_at = Utc::now();
        save_budget(&txn, &budget).await?;
        commit_txn(txn).await?;
        Ok(VersionWrite::Written(budget))
    }

    async fn append_committed_version(
        &self,
        expected_current: u32,
        version: &BudgetVersion,
    ) -> Result<VersionWrite, StoreError> {
        let txn = self.begin().await?;
        let Some(mut budget) = lock_budget(&txn, version.budget_id).await? else {
            return Ok(VersionWrite::BudgetNotFound);
        };
        let before = load_chain(&txn, budget.id).await?;
        if budget.current_version != expected_current || version.number != before.next_number() {
            return Ok(VersionWrite::Conflict {
                actual: budget.current_version,
            });
        }
        if budget.status == BudgetStatus::UnderReview {
            return Ok(VersionWrite::UnderReview);
        }

        let now = Utc::now();
        let mut chain = before.clone();
        if let Some(pending) = chain.pending().map(|v| v.number) {
            chain.discard(pending);
        }
        chain.push_committed(version.clone(), now);
        save_chain(&txn, &before, &chain).await?;

        budget.previous_version = Some(budget.current_version);
        budget.current_version = version.number;
        budget.requested_amount = version.total_amount;
        if budget.status != BudgetStatus::Draft {
            budget.status = BudgetStatus::Approved;
            budget.approved_amount = version.total_amount;
        }
        budget.updated_at = now;
        save_budget(&txn, &budget).await?;
        commit_txn(txn).await?;
        Ok(VersionWrite::Written(budget))
    }

    async fn post_obligation(&self, obligation: &Obligation) -> Result<PostingOutcome, StoreError> {
        let txn = self.begin().await?;
        if fiscal_year_locked(&txn, obligation.fiscal_year_id).await? {
            return Ok(PostingOutcome::FiscalYearLocked);
        }
        let Some(appropriation) = lock_appropriation(&txn, obligation.appropriation_id).await?
        else {
            return Ok(PostingOutcome::AppropriationNotFound);
        };
        let Some(mut budget) = lock_budget(&txn, obligation.budget_id).await? else {
            return Ok(PostingOutcome::BudgetNotFound);
        };
        if appropriation.obligated + obligation.amount > appropriation.appropriated {
            return Ok(PostingOutcome::InsufficientFunds {
                available: appropriation.available(),
            });
        }
        if budget.obligated_amount + obligation.amount > budget.approved_amount {
            return Ok(PostingOutcome::BudgetCeilingExceeded {
                available: budget.unobligated(),
            });
        }

        let now = Utc::now();
        appropriations::ActiveModel {
            id: Set(appropriation.id.into_inner()),
            obligated: Set(appropriation.obligated + obligation.amount),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(store_err)?;
        budget.obligated_amount += obligation.amount;
        budget.updated_at = now;
        save_budget(&txn, &budget).await?;
        obligations::ActiveModel::from(obligation)
            .insert(&txn)
            .await
            .map_err(store_err)?;
        commit_txn(txn).await?;
        Ok(PostingOutcome::Posted)
    }

    async fn obligation(&self, id: ObligationId) -> Result<Option<Obligation>, StoreError> {
        Ok(obligations::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(Obligation::from))
    }

    async fn budget_obligations(&self, budget_id: BudgetId) -> Result<Vec<Obligation>, StoreError> {
        Ok(obligations::Entity::find()
            .filter(obligations::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_asc(obligations::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(Obligation::from)
            .collect())
    }

    async fn cancel_obligation(
        &self,
        id: ObligationId,
        at: DateTime<Utc>,
    ) -> Result<CancelOutcome, StoreError> {
        let txn = self.begin().await?;
        let Some(mut obligation) = lock_obligation(&txn, id).await? else {
            return Ok(CancelOutcome::NotFound);
        };
        if !obligation.active {
            return Ok(CancelOutcome::AlreadyCancelled);
        }
        if fiscal_year_locked(&txn, obligation.fiscal_year_id).await? {
            return Ok(CancelOutcome::FiscalYearLocked);
        }
        let count = expenditures::Entity::find()
            .filter(expenditures::Column::ObligationId.eq(id.into_inner()))
            .count(&txn)
            .await
            .map_err(store_err)?;
        if count > 0 {
            return Ok(CancelOutcome::HasExpenditures {
                count: usize::try_from(count).unwrap_or(usize::MAX),
            });
        }
        let Some(appropriation) = lock_appropriation(&txn, obligation.appropriation_id).await?
        else {
            return Err(StoreError::Corrupt(format!(
                "obligation {id} references a missing appropriation"
            )));
        };
        let Some(mut budget) = lock_budget(&txn, obligation.budget_id).await? else {
            return Err(StoreError::Corrupt(format!(
                "obligation {id} references a missing budget"
            )));
        };

        appropriations::ActiveModel {
            id: Set(appropriation.id.into_inner()),
            obligated: Set(appropriation.obligated - obligation.amount),
            updated_at: Set(at),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(store_err)?;
        budget.obligated_amount -= obligation.amount;
        budget.updated_at = at;
        save_budget(&txn, &budget).await?;

        obligation.active = false;
        obligation.cancelled_at = Some(at);
        obligations::ActiveModel {
            id: Set(id.into_inner()),
            active: Set(false),
            cancelled_at: Set(Some(at)),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(store_err)?;
        commit_txn(txn).await?;
        Ok(CancelOutcome::Cancelled(obligation))
    }

    async fn post_expenditure(
        &self,
        expenditure: &Expenditure,
    ) -> Result<ExpenditureOutcome, StoreError> {
        let txn = self.begin().await?;
        let Some(obligation) = lock_obligation(&txn, expenditure.obligation_id).await? else {
            return Ok(ExpenditureOutcome::NotFound);
        };
        if !obligation.active {
            return Ok(ExpenditureOutcome::ObligationInactive);
        }
        if fiscal_year_locked(&txn, obligation.fiscal_year_id).await? {
            return Ok(ExpenditureOutcome::FiscalYearLocked);
        }
        if obligation.expended + expenditure.amount > obligation.amount {
            return Ok(ExpenditureOutcome::ExceedsObligation {
                remaining: obligation.remaining(),
            });
        }

        obligations::ActiveModel {
            id: Set(obligation.id.into_inner()),
            expended: Set(obligation.expended + expenditure.amount),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(store_err)?;
        if let Some(mut budget) = lock_budget(&txn, obligation.budget_id).await? {
            budget.expended_amount += expenditure.amount;
            budget.updated_at = expenditure.created_at;
            save_budget(&txn, &budget).await?;
        } else {
            warn!(obligation_id = %obligation.id, "expenditure posted against an obligation with no budget");
        }
        expenditures::ActiveModel::from(expenditure)
            .insert(&txn)
            .await
            .map_err(store_err)?;
        commit_txn(txn).await?;
        Ok(ExpenditureOutcome::Posted)
    }

    async fn expenditures(
        &self,
        obligation_id: ObligationId,
    ) -> Result<Vec<Expenditure>, StoreError> {
        Ok(expenditures::Entity::find()
            .filter(expenditures::Column::ObligationId.eq(obligation_id.into_inner()))
            .order_by_asc(expenditures::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?
            .into_iter()
            .map(Expenditure::from)
            .collect())
    }

    async fn insert_workflow(&self, workflow: &ApprovalWorkflow) -> Result<(), StoreError> {
        approval_workflows::ActiveModel::try_from(workflow)?
            .insert(&self.db)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn workflow(
        &self,
        id: ApprovalWorkflowId,
    ) -> Result<Option<ApprovalWorkflow>, StoreError> {
        approval_workflows::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(ApprovalWorkflow::try_from)
            .transpose()
    }

    async fn approval_request(
        &self,
        id: ApprovalRequestId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        approval_requests::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(ApprovalRequest::try_from)
            .transpose()
    }

    async fn latest_budget_request(
        &self,
        budget_id: BudgetId,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        approval_requests::Entity::find()
            .filter(approval_requests::Column::BudgetId.eq(budget_id.into_inner()))
            .order_by_desc(approval_requests::Column::CreatedAt)
            .order_by_desc(approval_requests::Column::Id)
            .one(&self.db)
            .await
            .map_err(store_err)?
            .map(ApprovalRequest::try_from)
            .transpose()
    }

    async fn save_approval(&self, update: &ApprovalUpdate) -> Result<ApprovalWrite, StoreError> {
        let request = &update.request;
        let txn = self.begin().await?;

        let stored = approval_requests::Entity::find_by_id(request.id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(store_err)?
            .map(ApprovalRequest::try_from)
            .transpose()?;
        match (update.expected_revision, stored.as_ref()) {
            (Some(expected), Some(stored)) if stored.revision != expected => {
                return Ok(ApprovalWrite::RevisionConflict {
                    actual: stored.revision,
                });
            }
            (Some(_), None) => {
                return Ok(ApprovalWrite::RevisionConflict { actual: 0 });
            }
            (None, Some(stored)) => {
                return Ok(ApprovalWrite::RevisionConflict {
                    actual: stored.revision,
                });
            }
            _ => {}
        }

        let Some(mut budget) = lock_budget(&txn, request.budget_id).await? else {
            return Ok(ApprovalWrite::BudgetNotFound);
        };
        // A second request may not open while one is under review.
        if update.expected_revision.is_none() && budget.status == BudgetStatus::UnderReview {
            return Ok(ApprovalWrite::RevisionConflict { actual: 0 });
        }

        let before = load_chain(&txn, budget.id).await?;
        if let Some(commit) = update.commit {
            if budget.current_version != commit.expected_current {
                return Ok(ApprovalWrite::VersionConflict {
                    expected: commit.expected_current,
                    actual: budget.current_version,
                });
            }
            if !before
                .get(commit.version)
                .is_some_and(|v| v.state == VersionState::Pending)
            {
                return Ok(ApprovalWrite::VersionNotFound(commit.version));
            }
        }

        let now = Utc::now();
        let mut chain = before.clone();
        if let Some(commit) = update.commit {
            chain.commit(commit.version, now);
            budget.previous_version = Some(budget.current_version);
            budget.current_version = commit.version;
            budget.approved_amount = chain.current().total_amount;
        }
        if let Some(number) = update.discard_version {
            chain.discard(number);
        }
        save_chain(&txn, &before, &chain).await?;

        budget.status = update.budget_status;
        budget.updated_at = now;
        save_budget(&txn, &budget).await?;

        let model = approval_requests::ActiveModel::try_from(request)?;
        if stored.is_some() {
            model.update(&txn).await.map_err(store_err)?;
        } else {
            model.insert(&txn).await.map_err(store_err)?;
        }
        commit_txn(txn).await?;
        Ok(ApprovalWrite::Saved(budget))
    }
}
