//! Fiscal year and appropriation types.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use fundctl_shared::types::{AppropriationId, FiscalYearId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a fiscal year.
///
/// Transitions only move forward:
/// - Future → Current
/// - Current → Past
/// - Past → Locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiscalYearStatus {
    /// Year has not started yet.
    Future,
    /// The one year currently in execution.
    Current,
    /// Year has ended; expired funds may still be adjusted.
    Past,
    /// Books are closed. No appropriation under the year may change.
    Locked,
}

impl FiscalYearStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Future => "future",
            Self::Current => "current",
            Self::Past => "past",
            Self::Locked => "locked",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "future" => Some(Self::Future),
            "current" => Some(Self::Current),
            "past" => Some(Self::Past),
            "locked" => Some(Self::Locked),
            _ => None,
        }
    }

    /// Returns the next state in the lifecycle, if any.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Future => Some(Self::Current),
            Self::Current => Some(Self::Past),
            Self::Past => Some(Self::Locked),
            Self::Locked => None,
        }
    }
}

impl fmt::Display for FiscalYearStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A federal fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    /// Unique identifier.
    pub id: FiscalYearId,
    /// Fiscal year number (FY2026 runs Oct 1 2025 – Sep 30 2026).
    pub year: i32,
    /// First day of the year.
    pub start_date: NaiveDate,
    /// Last day of the year (inclusive).
    pub end_date: NaiveDate,
    /// Lifecycle state.
    pub status: FiscalYearStatus,
}

impl FiscalYear {
    /// Builds fiscal year `year` using the Oct 1 – Sep 30 convention.
    ///
    /// The status is derived from `today`. Returns `None` when the
    /// calendar dates cannot be represented.
    #[must_use]
    pub fn federal(year: i32, today: NaiveDate) -> Option<Self> {
        let start_date = NaiveDate::from_ymd_opt(year - 1, 10, 1)?;
        let end_date = NaiveDate::from_ymd_opt(year, 9, 30)?;
        let mut fiscal_year = Self {
            id: FiscalYearId::new(),
            year,
            start_date,
            end_date,
            status: FiscalYearStatus::Future,
        };
        fiscal_year.status = fiscal_year.status_on(today);
        Some(fiscal_year)
    }

    /// Returns the federal fiscal year number that contains `date`.
    #[must_use]
    pub fn federal_year_of(date: NaiveDate) -> i32 {
        if date.month() >= 10 {
            date.year() + 1
        } else {
            date.year()
        }
    }

    /// Returns true if the given date falls within this fiscal year.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Returns the date-derived status, ignoring locks.
    #[must_use]
    pub fn status_on(&self, today: NaiveDate) -> FiscalYearStatus {
        if today < self.start_date {
            FiscalYearStatus::Future
        } else if today <= self.end_date {
            FiscalYearStatus::Current
        } else {
            FiscalYearStatus::Past
        }
    }

    /// Returns true once the year is locked.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.status == FiscalYearStatus::Locked
    }
}

/// Legal category of an appropriation ("color of money").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorOfMoney {
    /// Research, development, test and evaluation.
    ResearchDevelopment,
    /// Procurement.
    Procurement,
    /// Operations and maintenance, active component.
    OperationsMaintenance,
    /// Operations and maintenance, reserve component.
    OperationsMaintenanceReserve,
    /// Operations and maintenance, national guard.
    OperationsMaintenanceGuard,
    /// Military personnel.
    MilitaryPersonnel,
    /// Military construction.
    MilitaryConstruction,
    /// Family housing.
    FamilyHousing,
}

impl ColorOfMoney {
    /// All colors, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::ResearchDevelopment,
        Self::Procurement,
        Self::OperationsMaintenance,
        Self::OperationsMaintenanceReserve,
        Self::OperationsMaintenanceGuard,
        Self::MilitaryPersonnel,
        Self::MilitaryConstruction,
        Self::FamilyHousing,
    ];

    /// Returns the string representation of the color.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResearchDevelopment => "research_development",
            Self::Procurement => "procurement",
            Self::OperationsMaintenance => "operations_maintenance",
            Self::OperationsMaintenanceReserve => "operations_maintenance_reserve",
            Self::OperationsMaintenanceGuard => "operations_maintenance_guard",
            Self::MilitaryPersonnel => "military_personnel",
            Self::MilitaryConstruction => "military_construction",
            Self::FamilyHousing => "family_housing",
        }
    }

    /// Parses a color from a string.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str() == s.to_lowercase())
    }

    /// Number of fiscal years the funds stay available for new obligations.
    #[must_use]
    pub fn obligation_years(&self) -> u32 {
        match self {
            Self::OperationsMaintenance
            | Self::OperationsMaintenanceReserve
            | Self::OperationsMaintenanceGuard
            | Self::MilitaryPersonnel => 1,
            Self::ResearchDevelopment => 2,
            Self::Procurement => 3,
            Self::MilitaryConstruction | Self::FamilyHousing => 5,
        }
    }
}

impl fmt::Display for ColorOfMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Restrictions placed on an appropriation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionFlags {
    /// No new reservations are accepted.
    pub frozen: bool,
    /// Obligations may be dated outside the fiscal year window.
    pub multi_year: bool,
}

/// An appropriation: a legal ceiling on obligations for one fiscal year
/// and color of money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appropriation {
    /// Unique identifier.
    pub id: AppropriationId,
    /// Fiscal year the funds were appropriated for.
    pub fiscal_year_id: FiscalYearId,
    /// Color of money.
    pub color: ColorOfMoney,
    /// Total appropriated amount.
    pub appropriated: Decimal,
    /// Amount already obligated. Never exceeds `appropriated`.
    pub obligated: Decimal,
    /// Last day the funds may be newly obligated.
    pub expiration_date: NaiveDate,
    /// Restriction flags.
    pub restrictions: RestrictionFlags,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Appropriation {
    /// Unobligated balance.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.appropriated - self.obligated
    }

    /// Returns true if the funds expired before `as_of`.
    #[must_use]
    pub fn is_expired_on(&self, as_of: NaiveDate) -> bool {
        as_of > self.expiration_date
    }
}

/// Result of a fund availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityCheck {
    /// Appropriation checked.
    pub appropriation_id: AppropriationId,
    /// Amount asked for.
    pub requested: Decimal,
    /// Unobligated balance at the time of the check.
    pub available_balance: Decimal,
    /// Whether the full amount fits.
    pub available: bool,
    /// How much is missing; zero when available.
    pub shortfall: Decimal,
}

/// Input for creating an appropriation.
#[derive(Debug, Clone)]
pub struct CreateAppropriationInput {
    /// Fiscal year.
    pub fiscal_year_id: FiscalYearId,
    /// Color of money.
    pub color: ColorOfMoney,
    /// Total appropriated amount.
    pub appropriated: Decimal,
    /// Explicit expiration; defaults from the color of money.
    pub expiration_date: Option<NaiveDate>,
    /// Restriction flags.
    pub restrictions: RestrictionFlags,
}

/// A status change applied to a fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYearTransition {
    /// Fiscal year changed.
    pub fiscal_year_id: FiscalYearId,
    /// Fiscal year number.
    pub year: i32,
    /// Previous status.
    pub from: FiscalYearStatus,
    /// New status.
    pub to: FiscalYearStatus,
}
