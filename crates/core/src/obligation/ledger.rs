//! Obligation and expenditure ledger.

use chrono::Utc;
use fundctl_shared::types::{BudgetId, ExpenditureId, ObligationId, UserId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::error::ObligationError;
use super::types::{CreateExpenditureInput, CreateObligationInput, Expenditure, Obligation};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::collaborators::Collaborators;
use crate::fiscal::{ExpiryReason, FiscalError, FiscalLedger, FundsControl, fits_money_scale};
use crate::store::{CancelOutcome, ExpenditureOutcome, FundControlStore, PostingOutcome};

/// Records obligations against budgets and appropriations, and
/// expenditures against obligations.
pub struct ObligationLedger<S> {
    store: Arc<S>,
    fiscal: FiscalLedger<S>,
    collaborators: Collaborators,
}

impl<S> Clone for ObligationLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fiscal: self.fiscal.clone(),
            collaborators: self.collaborators.clone(),
        }
    }
}

impl<S: FundControlStore> ObligationLedger<S> {
    /// Creates a ledger over `store`.
    pub fn new(store: Arc<S>, collaborators: Collaborators) -> Self {
        Self {
            fiscal: FiscalLedger::new(Arc::clone(&store), collaborators.clone()),
            store,
            collaborators,
        }
    }

    /// Records an obligation.
    ///
    /// Checks run in order: amount, budget and line item, bona fide need,
    /// appropriation lock, expiry and freeze. The reservation against the
    /// appropriation, the budget ceiling check and the insert then happen
    /// in one atomic store step, so a failed attempt leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns `BonaFideNeedViolation` for dates outside the fiscal year
    /// without a justification, `FundsUnavailable` (as `Fiscal`) when the
    /// appropriation is short, and `BudgetCeilingExceeded` when the
    /// budget's approved amount is short.
    #[instrument(skip(self, input), fields(budget_id = %input.budget_id, appropriation_id = %input.appropriation_id, amount = %input.amount))]
    pub async fn create_obligation(
        &self,
        input: CreateObligationInput,
        actor: UserId,
    ) -> Result<Obligation, ObligationError> {
        check_amount(input.amount)?;

        let budget = self
            .store
            .budget(input.budget_id)
            .await?
            .ok_or(ObligationError::BudgetNotFound(input.budget_id))?;
        let (appropriation, fiscal_year) = self
            .fiscal
            .appropriation_context(input.appropriation_id)
            .await?;

        if let Some(line_item_id) = input.line_item_id {
            let current = self
                .store
                .budget_version(budget.id, budget.current_version)
                .await?;
            if current.and_then(|v| v.line_item(line_item_id).cloned()).is_none() {
                return Err(ObligationError::LineItemNotFound(line_item_id));
            }
        }

        let mut bona_fide_need_override = None;
        if !fiscal_year.contains(input.date) && !appropriation.restrictions.multi_year {
            let justification = input
                .bona_fide_need_justification
                .filter(|j| !j.trim().is_empty())
                .ok_or(ObligationError::BonaFideNeedViolation {
                    date: input.date,
                    start: fiscal_year.start_date,
                    end: fiscal_year.end_date,
                })?;
            warn!(
                date = %input.date,
                fiscal_year = fiscal_year.year,
                %justification,
                "bona fide need override"
            );
            bona_fide_need_override = Some(justification);
        }

        FundsControl::validate_reservation(&appropriation, &fiscal_year, input.amount, input.date)?;

        let obligation = Obligation {
            id: ObligationId::new(),
            budget_id: budget.id,
            appropriation_id: appropriation.id,
            fiscal_year_id: fiscal_year.id,
            line_item_id: input.line_item_id,
            amount: input.amount,
            expended: Decimal::ZERO,
            date: input.date,
            bona_fide_need_override,
            active: true,
            created_by: actor,
            created_at: Utc::now(),
            cancelled_at: None,
        };

        match self.store.post_obligation(&obligation).await? {
            PostingOutcome::Posted => {}
            PostingOutcome::InsufficientFunds { available } => {
                return Err(FiscalError::FundsUnavailable {
                    appropriation_id: appropriation.id,
                    requested: obligation.amount,
                    available,
                    shortfall: obligation.amount - available,
                }
                .into());
            }
            PostingOutcome::BudgetCeilingExceeded { available } => {
                return Err(ObligationError::BudgetCeilingExceeded {
                    budget_id: budget.id,
                    requested: obligation.amount,
                    available,
                    shortfall: obligation.amount - available,
                });
            }
            PostingOutcome::FiscalYearLocked => {
                return Err(FiscalError::AppropriationExpired {
                    appropriation_id: appropriation.id,
                    reason: ExpiryReason::FiscalYearLocked,
                }
                .into());
            }
            PostingOutcome::AppropriationNotFound => {
                return Err(FiscalError::AppropriationNotFound(appropriation.id).into());
            }
            PostingOutcome::BudgetNotFound => {
                return Err(ObligationError::BudgetNotFound(budget.id));
            }
        }

        info!(obligation_id = %obligation.id, "obligation created");

        if let Some(justification) = &obligation.bona_fide_need_override {
            self.collaborators
                .audit(
                    AuditRecord::new(
                        Some(actor),
                        AuditAction::BonaFideNeedOverride,
                        AuditEntity::Obligation,
                        obligation.id,
                    )
                    .with_after(&serde_json::json!({
                        "date": obligation.date,
                        "fiscal_year": fiscal_year.year,
                        "justification": justification,
                    })),
                )
                .await;
        }
        self.collaborators
            .audit(
                AuditRecord::new(
                    Some(actor),
                    AuditAction::ObligationCreated,
                    AuditEntity::Obligation,
                    obligation.id,
                )
                .with_after(&obligation),
            )
            .await;

        Ok(obligation)
    }

    /// Cancels an obligation and releases its reservation.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if it is already cancelled,
    /// `ObligationHasExpenditures` once money was disbursed, and
    /// `FiscalYearLocked` (as `Fiscal`) for locked years.
    #[instrument(skip(self))]
    pub async fn cancel_obligation(
        &self,
        id: ObligationId,
        actor: UserId,
    ) -> Result<Obligation, ObligationError> {
        let before = self.obligation(id).await?;
        if !before.active {
            return Err(ObligationError::InvalidTransition(id));
        }

        let cancelled = match self.store.cancel_obligation(id, Utc::now()).await? {
            CancelOutcome::Cancelled(obligation) => obligation,
            CancelOutcome::AlreadyCancelled => return Err(ObligationError::InvalidTransition(id)),
            CancelOutcome::HasExpenditures { count } => {
                return Err(ObligationError::ObligationHasExpenditures { id, count });
            }
            CancelOutcome::FiscalYearLocked => {
                return Err(FiscalError::FiscalYearLocked(before.fiscal_year_id).into());
            }
            CancelOutcome::NotFound => return Err(ObligationError::ObligationNotFound(id)),
        };
        info!(obligation_id = %id, amount = %cancelled.amount, "obligation cancelled");

        self.collaborators
            .audit(
                AuditRecord::new(
                    Some(actor),
                    AuditAction::ObligationCancelled,
                    AuditEntity::Obligation,
                    id,
                )
                .with_before(&before)
                .with_after(&cancelled),
            )
            .await;

        Ok(cancelled)
    }

    /// Posts an expenditure against an obligation.
    ///
    /// # Errors
    ///
    /// Returns `ExpenditureExceedsObligation` when cumulative spending would
    /// pass the obligation amount, `ObligationCancelled` for inactive
    /// obligations and `ExpenditureBeforeObligation` for early dates.
    #[instrument(skip(self, input), fields(obligation_id = %input.obligation_id, amount = %input.amount))]
    pub async fn create_expenditure(
        &self,
        input: CreateExpenditureInput,
        actor: UserId,
    ) -> Result<Expenditure, ObligationError> {
        check_amount(input.amount)?;

        let obligation = self.obligation(input.obligation_id).await?;
        if !obligation.active {
            return Err(ObligationError::ObligationCancelled(obligation.id));
        }
        if input.date < obligation.date {
            return Err(ObligationError::ExpenditureBeforeObligation {
                date: input.date,
                obligation_date: obligation.date,
            });
        }

        let expenditure = Expenditure {
            id: ExpenditureId::new(),
            obligation_id: obligation.id,
            amount: input.amount,
            date: input.date,
            created_by: actor,
            created_at: Utc::now(),
        };

        match self.store.post_expenditure(&expenditure).await? {
            ExpenditureOutcome::Posted => {}
            ExpenditureOutcome::ExceedsObligation { remaining } => {
                return Err(ObligationError::ExpenditureExceedsObligation {
                    requested: expenditure.amount,
                    remaining,
                });
            }
            ExpenditureOutcome::ObligationInactive => {
                return Err(ObligationError::ObligationCancelled(obligation.id));
            }
            ExpenditureOutcome::FiscalYearLocked => {
                return Err(FiscalError::FiscalYearLocked(obligation.fiscal_year_id).into());
            }
            ExpenditureOutcome::NotFound => {
                return Err(ObligationError::ObligationNotFound(obligation.id));
            }
        }
        info!(expenditure_id = %expenditure.id, "expenditure posted");

        self.collaborators
            .audit(
                AuditRecord::new(
                    Some(actor),
                    AuditAction::ExpenditurePosted,
                    AuditEntity::Expenditure,
                    expenditure.id,
                )
                .with_after(&expenditure),
            )
            .await;

        Ok(expenditure)
    }

    /// Loads an obligation.
    ///
    /// # Errors
    ///
    /// Returns `ObligationNotFound` if it does not exist.
    pub async fn obligation(&self, id: ObligationId) -> Result<Obligation, ObligationError> {
        self.store
            .obligation(id)
            .await?
            .ok_or(ObligationError::ObligationNotFound(id))
    }

    /// Obligations recorded against a budget, active or not.
    ///
    /// # Errors
    ///
    /// Returns `Store` on persistence failure.
    pub async fn budget_obligations(
        &self,
        budget_id: BudgetId,
    ) -> Result<Vec<Obligation>, ObligationError> {
        Ok(self.store.budget_obligations(budget_id).await?)
    }

    /// Expenditures posted against an obligation.
    ///
    /// # Errors
    ///
    /// Returns `Store` on persistence failure.
    pub async fn expenditures(
        &self,
        obligation_id: ObligationId,
    ) -> Result<Vec<Expenditure>, ObligationError> {
        Ok(self.store.expenditures(obligation_id).await?)
    }
}

fn check_amount(amount: Decimal) -> Result<(), ObligationError> {
    if amount <= Decimal::ZERO {
        return Err(ObligationError::InvalidAmount(amount));
    }
    if !fits_money_scale(amount) {
        return Err(ObligationError::InvalidPrecision(amount));
    }
    Ok(())
}
