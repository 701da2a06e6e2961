//! Budget version store.

use chrono::Utc;
use fundctl_shared::types::{BudgetId, BudgetLineItemId, UserId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::error::VersionError;
use super::types::{
    Budget, BudgetChanges, BudgetLineItem, BudgetStatus, BudgetVersion, CreateBudgetInput,
    VersionSource, VersionState,
};
use super::version::{VersionChain, apply_changes, check_amount, derive_version};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::collaborators::Collaborators;
use crate::identity::Role;
use crate::store::{FundControlStore, StoreError, VersionWrite};

/// Maintains each budget's chain of versions.
pub struct BudgetVersionStore<S> {
    store: Arc<S>,
    collaborators: Collaborators,
}

impl<S> Clone for BudgetVersionStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collaborators: self.collaborators.clone(),
        }
    }
}

impl<S: FundControlStore> BudgetVersionStore<S> {
    /// Creates a version store over `store`.
    pub fn new(store: Arc<S>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    /// Creates a draft budget whose first version is current.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for negative amounts, `InvalidPrecision`
    /// for amounts finer than four decimal places and
    /// `FiscalYearNotFound` for an unknown fiscal year.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_budget(
        &self,
        input: CreateBudgetInput,
        created_by: UserId,
    ) -> Result<Budget, VersionError> {
        check_amount(input.total_amount)?;
        for item in &input.line_items {
            check_amount(item.amount)?;
        }
        if self.store.fiscal_year(input.fiscal_year_id).await?.is_none() {
            return Err(VersionError::FiscalYearNotFound(input.fiscal_year_id));
        }

        let now = Utc::now();
        let budget = Budget {
            id: BudgetId::new(),
            organization_id: input.organization_id,
            fiscal_year_id: input.fiscal_year_id,
            name: input.name,
            approval_workflow_id: input.approval_workflow_id,
            current_version: 1,
            previous_version: None,
            status: BudgetStatus::Draft,
            requested_amount: input.total_amount,
            approved_amount: Decimal::ZERO,
            obligated_amount: Decimal::ZERO,
            expended_amount: Decimal::ZERO,
            created_by,
            created_at: now,
            updated_at: now,
        };
        let version = BudgetVersion {
            budget_id: budget.id,
            number: 1,
            state: VersionState::Current,
            total_amount: input.total_amount,
            line_items: input
                .line_items
                .into_iter()
                .map(|item| BudgetLineItem {
                    id: BudgetLineItemId::new(),
                    category: item.category,
                    amount: item.amount,
                })
                .collect(),
            previous: None,
            source: VersionSource::Draft,
            created_by,
            created_at: now,
            committed_at: Some(now),
        };
        warn_if_unreconciled(&version);

        self.store.insert_budget(&budget, &version).await?;
        info!(budget_id = %budget.id, total = %version.total_amount, "budget created");

        self.collaborators
            .audit(
                AuditRecord::new(
                    Some(created_by),
                    AuditAction::BudgetCreated,
                    AuditEntity::Budget,
                    budget.id,
                )
                .with_after(&version),
            )
            .await;

        Ok(budget)
    }

    /// Loads a budget.
    ///
    /// # Errors
    ///
    /// Returns `BudgetNotFound` if it does not exist.
    pub async fn budget(&self, id: BudgetId) -> Result<Budget, VersionError> {
        self.store
            .budget(id)
            .await?
            .ok_or(VersionError::BudgetNotFound(id))
    }

    /// Loads a budget's version chain.
    ///
    /// # Errors
    ///
    /// Returns `BudgetNotFound` if it does not exist.
    pub async fn chain(&self, id: BudgetId) -> Result<VersionChain, VersionError> {
        let versions = self.store.budget_versions(id).await?;
        if versions.is_empty() {
            return Err(VersionError::BudgetNotFound(id));
        }
        VersionChain::from_versions(versions).ok_or_else(|| {
            StoreError::Corrupt(format!("budget {id} has no single current version"))
                .into()
        })
    }

    /// Loads the current version.
    ///
    /// # Errors
    ///
    /// Returns `BudgetNotFound` if the budget does not exist.
    pub async fn current_version(&self, id: BudgetId) -> Result<BudgetVersion, VersionError> {
        Ok(self.chain(id).await?.current().clone())
    }

    /// Loads the open pending version, if any.
    ///
    /// # Errors
    ///
    /// Returns `BudgetNotFound` if the budget does not exist.
    pub async fn open_pending(&self, id: BudgetId) -> Result<Option<BudgetVersion>, VersionError> {
        Ok(self.chain(id).await?.pending().cloned())
    }

    /// Edits the current version of a draft budget in place.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable` once the budget has been submitted and
    /// `VersionConflict` when `expected_version` is stale.
    #[instrument(skip(self, changes))]
    pub async fn update_draft(
        &self,
        budget_id: BudgetId,
        expected_version: u32,
        changes: BudgetChanges,
        actor: UserId,
    ) -> Result<BudgetVersion, VersionError> {
        let budget = self.budget(budget_id).await?;
        if budget.status != BudgetStatus::Draft {
            return Err(VersionError::NotEditable(budget.status));
        }
        check_expected(&budget, expected_version)?;

        let before = self.current_version(budget_id).await?;
        let (total_amount, line_items) = apply_changes(&before, &changes)?;
        let edited = BudgetVersion {
            total_amount,
            line_items,
            ..before.clone()
        };
        warn_if_unreconciled(&edited);

        let write = self
            .store
            .update_draft_version(expected_version, &edited)
            .await?;
        expect_written(budget_id, expected_version, write)?;
        info!(%budget_id, total = %edited.total_amount, "draft updated");

        self.collaborators
            .audit(
                AuditRecord::new(
                    Some(actor),
                    AuditAction::DraftUpdated,
                    AuditEntity::Budget,
                    budget_id,
                )
                .with_before(&before)
                .with_after(&edited),
            )
            .await;

        Ok(edited)
    }

    /// Proposes a new version built from the current one.
    ///
    /// The version stays pending until the approval engine commits it.
    /// Any older pending version is discarded.
    ///
    /// # Errors
    ///
    /// Returns `VersionConflict` when `expected_current` is stale and
    /// `UnderReview` while a request is in flight.
    #[instrument(skip(self, changes))]
    pub async fn create_pending_version(
        &self,
        budget_id: BudgetId,
        expected_current: u32,
        changes: BudgetChanges,
        actor: UserId,
    ) -> Result<BudgetVersion, VersionError> {
        let budget = self.budget(budget_id).await?;
        check_expected(&budget, expected_current)?;
        if budget.status == BudgetStatus::UnderReview {
            return Err(VersionError::UnderReview(budget_id));
        }

        let chain = self.chain(budget_id).await?;
        let pending = derive_version(
            chain.current(),
            chain.next_number(),
            &changes,
            VersionSource::Amendment,
            actor,
        )?;
        warn_if_unreconciled(&pending);

        let write = self
            .store
            .insert_pending_version(expected_current, &pending)
            .await?;
        expect_written(budget_id, expected_current, write)?;
        info!(%budget_id, version = pending.number, total = %pending.total_amount, "pending version created");

        self.collaborators
            .audit(
                AuditRecord::new(
                    Some(actor),
                    AuditAction::VersionCreated,
                    AuditEntity::Budget,
                    budget_id,
                )
                .with_before(chain.current())
                .with_after(&pending),
            )
            .await;

        Ok(pending)
    }

    /// Rolls a budget back to the content of an earlier committed version.
    ///
    /// A new version duplicating the target is created; history is never
    /// rewritten. Administrators commit it immediately. Everyone else gets
    /// a pending version that must go through approval. The returned
    /// version's state tells which happened.
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` when `target` is not in the committed
    /// chain and `UnderReview` while a request is in flight.
    #[instrument(skip(self))]
    pub async fn rollback(
        &self,
        budget_id: BudgetId,
        target: u32,
        actor: UserId,
    ) -> Result<BudgetVersion, VersionError> {
        let budget = self.budget(budget_id).await?;
        if budget.status == BudgetStatus::UnderReview {
            return Err(VersionError::UnderReview(budget_id));
        }

        let chain = self.chain(budget_id).await?;
        let source = chain
            .get(target)
            .filter(|v| v.state.is_committed())
            .ok_or(VersionError::VersionNotFound {
                budget_id,
                version: target,
            })?;

        let mut version = derive_version(
            source,
            chain.next_number(),
            &BudgetChanges::default(),
            VersionSource::Rollback { from: target },
            actor,
        )?;
        version.previous = Some(budget.current_version);

        let is_admin = self
            .collaborators
            .roles(actor)
            .await?
            .contains(&Role::admin());

        let write = if is_admin {
            version.state = VersionState::Current;
            version.committed_at = Some(Utc::now());
            self.store
                .append_committed_version(budget.current_version, &version)
                .await?
        } else {
            self.store
                .insert_pending_version(budget.current_version, &version)
                .await?
        };
        expect_written(budget_id, budget.current_version, write)?;
        info!(%budget_id, target, version = version.number, state = %version.state, "budget rolled back");

        self.collaborators
            .audit(
                AuditRecord::new(
                    Some(actor),
                    AuditAction::VersionRolledBack,
                    AuditEntity::Budget,
                    budget_id,
                )
                .with_before(chain.current())
                .with_after(&version),
            )
            .await;

        Ok(version)
    }

    /// Committed versions of a budget, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `BudgetNotFound` if the budget does not exist.
    pub async fn version_history(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<BudgetVersion>, VersionError> {
        Ok(self.chain(budget_id).await?.history().cloned().collect())
    }
}

fn check_expected(budget: &Budget, expected: u32) -> Result<(), VersionError> {
    if budget.current_version == expected {
        Ok(())
    } else {
        Err(VersionError::VersionConflict {
            budget_id: budget.id,
            expected,
            actual: budget.current_version,
        })
    }
}

fn expect_written(
    budget_id: BudgetId,
    expected: u32,
    write: VersionWrite,
) -> Result<Budget, VersionError> {
    match write {
        VersionWrite::Written(budget) => Ok(budget),
        VersionWrite::Conflict { actual } => Err(VersionError::VersionConflict {
            budget_id,
            expected,
            actual,
        }),
        VersionWrite::BudgetNotFound => Err(VersionError::BudgetNotFound(budget_id)),
        VersionWrite::NotEditable(status) => Err(VersionError::NotEditable(status)),
        VersionWrite::UnderReview => Err(VersionError::UnderReview(budget_id)),
    }
}

fn warn_if_unreconciled(version: &BudgetVersion) {
    if let Some(warning) = version.reconciliation_warning() {
        warn!(budget_id = %version.budget_id, version = version.number, "{warning}");
    }
}
