//! Pure fund-control rules.
//!
//! Nothing here touches storage. The ledgers call these checks before
//! handing the guarded write to the store.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;

use super::error::{ExpiryReason, FiscalError};
use super::types::{
    Appropriation, AvailabilityCheck, ColorOfMoney, FiscalYear, FiscalYearStatus,
};

/// Decimal places every stored amount carries.
pub const MONEY_SCALE: u32 = 4;

/// Whether `amount` is representable at [`MONEY_SCALE`] without rounding.
///
/// Trailing zeros do not count, so `1.50000` fits.
#[must_use]
pub fn fits_money_scale(amount: Decimal) -> bool {
    amount.round_dp(MONEY_SCALE) == amount
}

/// Fund-control rule set.
pub struct FundsControl;

impl FundsControl {
    /// Rejects amounts that are zero, negative or finer than a
    /// ten-thousandth.
    ///
    /// # Errors
    ///
    /// Returns `FiscalError::InvalidAmount` if `amount <= 0` and
    /// `FiscalError::InvalidPrecision` if it does not fit [`MONEY_SCALE`].
    pub fn validate_amount(amount: Decimal) -> Result<(), FiscalError> {
        if amount <= Decimal::ZERO {
            return Err(FiscalError::InvalidAmount(amount));
        }
        if !fits_money_scale(amount) {
            return Err(FiscalError::InvalidPrecision(amount));
        }
        Ok(())
    }

    /// Compares a requested amount with the unobligated balance.
    #[must_use]
    pub fn check_availability(appropriation: &Appropriation, amount: Decimal) -> AvailabilityCheck {
        let available_balance = appropriation.available();
        let shortfall = (amount - available_balance).max(Decimal::ZERO);
        AvailabilityCheck {
            appropriation_id: appropriation.id,
            requested: amount,
            available_balance,
            available: shortfall.is_zero(),
            shortfall,
        }
    }

    /// Validates that a reservation may be attempted.
    ///
    /// Checks run in order: amount, fiscal year lock, expiration, freeze.
    /// The balance itself is checked by the store's guarded update.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule.
    pub fn validate_reservation(
        appropriation: &Appropriation,
        fiscal_year: &FiscalYear,
        amount: Decimal,
        as_of: NaiveDate,
    ) -> Result<(), FiscalError> {
        Self::validate_amount(amount)?;

        if fiscal_year.is_locked() {
            return Err(FiscalError::AppropriationExpired {
                appropriation_id: appropriation.id,
                reason: ExpiryReason::FiscalYearLocked,
            });
        }

        if appropriation.is_expired_on(as_of) {
            return Err(FiscalError::AppropriationExpired {
                appropriation_id: appropriation.id,
                reason: ExpiryReason::PastExpiration(appropriation.expiration_date),
            });
        }

        if appropriation.restrictions.frozen {
            return Err(FiscalError::AppropriationFrozen(appropriation.id));
        }

        Ok(())
    }

    /// Default last obligation date for a color of money.
    ///
    /// One-year money expires at the end of its fiscal year; multi-year
    /// money runs to the end of the last fiscal year it covers.
    #[must_use]
    pub fn default_expiration(fiscal_year: &FiscalYear, color: ColorOfMoney) -> Option<NaiveDate> {
        let extra_years = color.obligation_years().saturating_sub(1);
        fiscal_year
            .end_date
            .checked_add_months(Months::new(12 * extra_years))
    }

    /// Returns true if `from -> to` is a single forward step.
    #[must_use]
    pub fn is_valid_transition(from: FiscalYearStatus, to: FiscalYearStatus) -> bool {
        from.next() == Some(to)
    }

    /// Validates a manual status change.
    ///
    /// # Errors
    ///
    /// Returns `FiscalError::InvalidStatusTransition` for anything other
    /// than a single forward step.
    pub fn validate_transition(
        from: FiscalYearStatus,
        to: FiscalYearStatus,
    ) -> Result<(), FiscalError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(FiscalError::InvalidStatusTransition { from, to })
        }
    }

    /// Date-driven transitions for a set of fiscal years.
    ///
    /// Demotions (current to past) come first, so applying the plan in
    /// order never leaves two years current. A future year whose dates
    /// already lie in the past still passes through current. Promotions
    /// and pass-throughs are planned only when no other year stays
    /// current. Locked years are never touched.
    #[must_use]
    pub fn planned_transitions(
        fiscal_years: &[FiscalYear],
        today: NaiveDate,
    ) -> Vec<(usize, FiscalYearStatus)> {
        let mut plan = Vec::new();
        let mut pass_through = Vec::new();
        let mut promotions = Vec::new();

        for (index, fiscal_year) in fiscal_years.iter().enumerate() {
            let target = fiscal_year.status_on(today);
            if fiscal_year.is_locked() || target <= fiscal_year.status {
                continue;
            }
            match (fiscal_year.status, target) {
                (FiscalYearStatus::Current, FiscalYearStatus::Past) => {
                    plan.push((index, FiscalYearStatus::Past));
                }
                (FiscalYearStatus::Future, FiscalYearStatus::Past) => {
                    pass_through.push(index);
                }
                (FiscalYearStatus::Future, FiscalYearStatus::Current) => {
                    promotions.push((index, FiscalYearStatus::Current));
                }
                _ => {}
            }
        }

        let stays_current = fiscal_years.iter().enumerate().any(|(index, fy)| {
            fy.status == FiscalYearStatus::Current && !plan.iter().any(|(d, _)| *d == index)
        });
        if stays_current {
            return plan;
        }

        for index in pass_through {
            plan.push((index, FiscalYearStatus::Current));
            plan.push((index, FiscalYearStatus::Past));
        }
        promotions.truncate(1);
        plan.extend(promotions);
        plan
    }
}
