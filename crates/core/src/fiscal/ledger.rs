//! Fiscal ledger: fiscal years, appropriations and fund availability.

use chrono::{NaiveDate, Utc};
use fundctl_shared::types::{AppropriationId, FiscalYearId, UserId};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};

use super::error::FiscalError;
use super::rules::FundsControl;
use super::types::{
    Appropriation, AvailabilityCheck, CreateAppropriationInput, FiscalYear, FiscalYearStatus,
    FiscalYearTransition,
};
use crate::audit::{AuditAction, AuditEntity, AuditRecord};
use crate::collaborators::Collaborators;
use crate::store::{FundControlStore, ReleaseOutcome, ReserveOutcome};

/// Owns fiscal years and appropriations.
pub struct FiscalLedger<S> {
    store: Arc<S>,
    collaborators: Collaborators,
}

impl<S> Clone for FiscalLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collaborators: self.collaborators.clone(),
        }
    }
}

impl<S: FundControlStore> FiscalLedger<S> {
    /// Creates a ledger over `store`.
    pub fn new(store: Arc<S>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    /// Creates federal fiscal year `year`, with its status derived from `today`.
    ///
    /// A year whose dates say current starts as future while another
    /// year is still current; `advance_fiscal_years` promotes it later.
    ///
    /// # Errors
    ///
    /// Returns `OverlappingYear` if the year exists, `InvalidYear` if its
    /// dates cannot be represented.
    #[instrument(skip(self))]
    pub async fn create_fiscal_year(
        &self,
        year: i32,
        today: NaiveDate,
        actor: Option<UserId>,
    ) -> Result<FiscalYear, FiscalError> {
        let mut fiscal_year =
            FiscalYear::federal(year, today).ok_or(FiscalError::InvalidYear(year))?;
        let existing = self.store.fiscal_years().await?;

        if existing.iter().any(|fy| {
            fy.year == year
                || (fy.start_date <= fiscal_year.end_date && fiscal_year.start_date <= fy.end_date)
        }) {
            return Err(FiscalError::OverlappingYear(year));
        }

        if fiscal_year.status == FiscalYearStatus::Current
            && existing.iter().any(|fy| fy.status == FiscalYearStatus::Current)
        {
            fiscal_year.status = FiscalYearStatus::Future;
        }

        self.store.insert_fiscal_year(&fiscal_year).await?;
        info!(fiscal_year_id = %fiscal_year.id, status = %fiscal_year.status, "fiscal year created");

        self.collaborators
            .audit(
                AuditRecord::new(
                    actor,
                    AuditAction::FiscalYearCreated,
                    AuditEntity::FiscalYear,
                    fiscal_year.id,
                )
                .with_after(&fiscal_year),
            )
            .await;

        Ok(fiscal_year)
    }

    /// Loads a fiscal year.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearNotFound` if it does not exist.
    pub async fn fiscal_year(&self, id: FiscalYearId) -> Result<FiscalYear, FiscalError> {
        self.store
            .fiscal_year(id)
            .await?
            .ok_or(FiscalError::FiscalYearNotFound(id))
    }

    /// Moves a fiscal year one step forward in its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` for anything but a single forward
    /// step, and `AnotherYearCurrent` when opening a year while another is
    /// still current.
    #[instrument(skip(self))]
    pub async fn transition_fiscal_year(
        &self,
        id: FiscalYearId,
        to: FiscalYearStatus,
        actor: Option<UserId>,
    ) -> Result<FiscalYear, FiscalError> {
        let fiscal_year = self.fiscal_year(id).await?;
        FundsControl::validate_transition(fiscal_year.status, to)?;

        if to == FiscalYearStatus::Current {
            let years = self.store.fiscal_years().await?;
            if let Some(current) = years
                .iter()
                .find(|fy| fy.status == FiscalYearStatus::Current && fy.id != id)
            {
                return Err(FiscalError::AnotherYearCurrent(current.id));
            }
        }

        if self
            .apply_transition(&fiscal_year, to, actor)
            .await?
            .is_none()
        {
            return Err(FiscalError::InvalidStatusTransition {
                from: fiscal_year.status,
                to,
            });
        }
        Ok(FiscalYear {
            status: to,
            ..fiscal_year
        })
    }

    /// Locks a past fiscal year.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatusTransition` unless the year is past.
    pub async fn lock_fiscal_year(
        &self,
        id: FiscalYearId,
        actor: Option<UserId>,
    ) -> Result<FiscalYear, FiscalError> {
        self.transition_fiscal_year(id, FiscalYearStatus::Locked, actor)
            .await
    }

    /// Applies date-driven status changes as of `today`.
    ///
    /// Never locks a year. Transitions that lose a race with a manual
    /// change are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Store` on persistence failure.
    #[instrument(skip(self))]
    pub async fn advance_fiscal_years(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<FiscalYearTransition>, FiscalError> {
        let mut years = self.store.fiscal_years().await?;
        let plan = FundsControl::planned_transitions(&years, today);
        let mut applied = Vec::with_capacity(plan.len());

        for (index, to) in plan {
            let fiscal_year = &years[index];
            if !FundsControl::is_valid_transition(fiscal_year.status, to) {
                continue;
            }
            if let Some(transition) = self.apply_transition(fiscal_year, to, None).await? {
                years[index].status = to;
                applied.push(transition);
            }
        }

        Ok(applied)
    }

    async fn apply_transition(
        &self,
        fiscal_year: &FiscalYear,
        to: FiscalYearStatus,
        actor: Option<UserId>,
    ) -> Result<Option<FiscalYearTransition>, FiscalError> {
        let from = fiscal_year.status;
        if !self
            .store
            .transition_fiscal_year(fiscal_year.id, from, to)
            .await?
        {
            return Ok(None);
        }

        info!(fiscal_year_id = %fiscal_year.id, year = fiscal_year.year, %from, %to, "fiscal year transitioned");
        let transition = FiscalYearTransition {
            fiscal_year_id: fiscal_year.id,
            year: fiscal_year.year,
            from,
            to,
        };
        self.collaborators
            .audit(
                AuditRecord::new(
                    actor,
                    AuditAction::FiscalYearTransitioned,
                    AuditEntity::FiscalYear,
                    fiscal_year.id,
                )
                .with_before(&from)
                .with_after(&to),
            )
            .await;

        Ok(Some(transition))
    }

    /// Creates an appropriation under an unlocked fiscal year.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount`, `FiscalYearNotFound`, `FiscalYearLocked` or
    /// `InvalidExpiration`.
    #[instrument(skip(self, input), fields(fiscal_year_id = %input.fiscal_year_id, color = %input.color))]
    pub async fn create_appropriation(
        &self,
        input: CreateAppropriationInput,
        actor: Option<UserId>,
    ) -> Result<Appropriation, FiscalError> {
        FundsControl::validate_amount(input.appropriated)?;
        let fiscal_year = self.fiscal_year(input.fiscal_year_id).await?;
        if fiscal_year.is_locked() {
            return Err(FiscalError::FiscalYearLocked(fiscal_year.id));
        }

        let expiration_date = match input.expiration_date {
            Some(date) => date,
            None => FundsControl::default_expiration(&fiscal_year, input.color)
                .ok_or(FiscalError::InvalidYear(fiscal_year.year))?,
        };
        if expiration_date < fiscal_year.start_date {
            return Err(FiscalError::InvalidExpiration(expiration_date));
        }

        let now = Utc::now();
        let appropriation = Appropriation {
            id: AppropriationId::new(),
            fiscal_year_id: fiscal_year.id,
            color: input.color,
            appropriated: input.appropriated,
            obligated: Decimal::ZERO,
            expiration_date,
            restrictions: input.restrictions,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_appropriation(&appropriation).await?;
        info!(appropriation_id = %appropriation.id, amount = %appropriation.appropriated, "appropriation created");

        self.collaborators
            .audit(
                AuditRecord::new(
                    actor,
                    AuditAction::AppropriationCreated,
                    AuditEntity::Appropriation,
                    appropriation.id,
                )
                .with_after(&appropriation),
            )
            .await;

        Ok(appropriation)
    }

    /// Loads an appropriation.
    ///
    /// # Errors
    ///
    /// Returns `AppropriationNotFound` if it does not exist.
    pub async fn appropriation(&self, id: AppropriationId) -> Result<Appropriation, FiscalError> {
        self.store
            .appropriation(id)
            .await?
            .ok_or(FiscalError::AppropriationNotFound(id))
    }

    /// Loads an appropriation together with its fiscal year.
    pub(crate) async fn appropriation_context(
        &self,
        id: AppropriationId,
    ) -> Result<(Appropriation, FiscalYear), FiscalError> {
        let appropriation = self.appropriation(id).await?;
        let fiscal_year = self.fiscal_year(appropriation.fiscal_year_id).await?;
        Ok((appropriation, fiscal_year))
    }

    /// Answers whether `amount` fits under the appropriation right now.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts and
    /// `AppropriationNotFound` for unknown appropriations.
    pub async fn check_availability(
        &self,
        id: AppropriationId,
        amount: Decimal,
    ) -> Result<AvailabilityCheck, FiscalError> {
        FundsControl::validate_amount(amount)?;
        let appropriation = self.appropriation(id).await?;
        Ok(FundsControl::check_availability(&appropriation, amount))
    }

    /// Atomically reserves `amount` against the appropriation.
    ///
    /// # Errors
    ///
    /// Returns `FundsUnavailable` with the shortfall when the balance is
    /// too small, and the `validate_reservation` errors otherwise.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        id: AppropriationId,
        amount: Decimal,
        as_of: NaiveDate,
        actor: Option<UserId>,
    ) -> Result<Appropriation, FiscalError> {
        let (appropriation, fiscal_year) = self.appropriation_context(id).await?;
        FundsControl::validate_reservation(&appropriation, &fiscal_year, amount, as_of)?;

        match self.store.reserve_funds(id, amount).await? {
            ReserveOutcome::Reserved { obligated } => {
                let reserved = Appropriation {
                    obligated,
                    updated_at: Utc::now(),
                    ..appropriation.clone()
                };
                info!(appropriation_id = %id, %amount, %obligated, "funds reserved");
                self.collaborators
                    .audit(
                        AuditRecord::new(
                            actor,
                            AuditAction::FundsReserved,
                            AuditEntity::Appropriation,
                            id,
                        )
                        .with_before(&appropriation)
                        .with_after(&reserved),
                    )
                    .await;
                Ok(reserved)
            }
            ReserveOutcome::Insufficient { available } => Err(FiscalError::FundsUnavailable {
                appropriation_id: id,
                requested: amount,
                available,
                shortfall: amount - available,
            }),
            ReserveOutcome::NotFound => Err(FiscalError::AppropriationNotFound(id)),
        }
    }

    /// Releases a previous reservation.
    ///
    /// # Errors
    ///
    /// Returns `FiscalYearLocked` for locked years and
    /// `ReleaseExceedsObligated` when releasing more than is obligated.
    #[instrument(skip(self))]
    pub async fn release(
        &self,
        id: AppropriationId,
        amount: Decimal,
        actor: Option<UserId>,
    ) -> Result<Appropriation, FiscalError> {
        FundsControl::validate_amount(amount)?;
        let (appropriation, fiscal_year) = self.appropriation_context(id).await?;
        if fiscal_year.is_locked() {
            return Err(FiscalError::FiscalYearLocked(fiscal_year.id));
        }

        match self.store.release_funds(id, amount).await? {
            ReleaseOutcome::Released { obligated } => {
                let released = Appropriation {
                    obligated,
                    updated_at: Utc::now(),
                    ..appropriation.clone()
                };
                info!(appropriation_id = %id, %amount, %obligated, "funds released");
                self.collaborators
                    .audit(
                        AuditRecord::new(
                            actor,
                            AuditAction::FundsReleased,
                            AuditEntity::Appropriation,
                            id,
                        )
                        .with_before(&appropriation)
                        .with_after(&released),
                    )
                    .await;
                Ok(released)
            }
            ReleaseOutcome::ExceedsObligated { obligated } => {
                Err(FiscalError::ReleaseExceedsObligated {
                    appropriation_id: id,
                    requested: amount,
                    obligated,
                })
            }
            ReleaseOutcome::NotFound => Err(FiscalError::AppropriationNotFound(id)),
        }
    }
}
