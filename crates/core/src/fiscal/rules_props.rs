//! Property-based tests for fund-control rules.

use chrono::{NaiveDate, Utc};
use fundctl_shared::types::AppropriationId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fiscal::rules::FundsControl;
use crate::fiscal::types::{
    Appropriation, ColorOfMoney, FiscalYear, FiscalYearStatus, RestrictionFlags,
};

/// Strategy for generating positive Decimal amounts with cents.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|n| Decimal::new(n, 2))
}

fn arb_status() -> impl Strategy<Value = FiscalYearStatus> {
    prop_oneof![
        Just(FiscalYearStatus::Future),
        Just(FiscalYearStatus::Current),
        Just(FiscalYearStatus::Past),
        Just(FiscalYearStatus::Locked),
    ]
}

/// Strategy for a date between FY2024 and FY2030.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..(365 * 7)).prop_map(|offset| {
        NaiveDate::from_ymd_opt(2023, 10, 1).unwrap() + chrono::Duration::days(offset)
    })
}

fn appropriation(appropriated: Decimal, obligated: Decimal) -> Appropriation {
    let fy = FiscalYear::federal(2026, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()).unwrap();
    Appropriation {
        id: AppropriationId::new(),
        fiscal_year_id: fy.id,
        color: ColorOfMoney::Procurement,
        appropriated,
        obligated,
        expiration_date: fy.end_date,
        restrictions: RestrictionFlags::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Available balance plus shortfall always covers the request, and the
    /// shortfall is zero exactly when the request fits.
    #[test]
    fn prop_availability_shortfall(
        appropriated in arb_amount(),
        used_pct in 0u32..=100,
        requested in arb_amount(),
    ) {
        let obligated = (appropriated * Decimal::from(used_pct) / Decimal::ONE_HUNDRED).round_dp(2);
        let approp = appropriation(appropriated, obligated);

        let check = FundsControl::check_availability(&approp, requested);

        prop_assert!(check.shortfall >= Decimal::ZERO);
        prop_assert_eq!(check.available, requested <= approp.available());
        prop_assert_eq!(check.available, check.shortfall.is_zero());
        if !check.available {
            prop_assert_eq!(check.available_balance + check.shortfall, requested);
        }
    }

    /// Only single forward steps are valid, and locked years never move.
    #[test]
    fn prop_transitions_only_move_forward(
        from in arb_status(),
        to in arb_status(),
    ) {
        let valid = FundsControl::is_valid_transition(from, to);
        prop_assert_eq!(valid, from.next() == Some(to));
        if valid {
            prop_assert!(to > from);
        }
        if from == FiscalYearStatus::Locked {
            prop_assert!(!valid);
        }
    }

    /// Applying planned transitions never leaves more than one current year.
    #[test]
    fn prop_planned_transitions_keep_one_current(
        first_year in 2024i32..2028,
        statuses in prop::collection::vec(arb_status(), 1..4),
        today in arb_date(),
    ) {
        let created = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut years: Vec<FiscalYear> = Vec::new();
        let mut seen_current = false;
        for (offset, status) in statuses.iter().enumerate() {
            let mut fy = FiscalYear::federal(first_year + offset as i32, created).unwrap();
            // Inputs themselves respect the one-current rule.
            fy.status = if *status == FiscalYearStatus::Current && seen_current {
                FiscalYearStatus::Future
            } else {
                *status
            };
            seen_current |= fy.status == FiscalYearStatus::Current;
            years.push(fy);
        }

        for (index, to) in FundsControl::planned_transitions(&years, today) {
            prop_assert!(FundsControl::is_valid_transition(years[index].status, to));
            years[index].status = to;
            let current = years
                .iter()
                .filter(|fy| fy.status == FiscalYearStatus::Current)
                .count();
            prop_assert!(current <= 1);
        }
    }

    /// Default expiration never precedes the end of the fiscal year.
    #[test]
    fn prop_default_expiration_after_year_end(year in 2000i32..2100) {
        let fy = FiscalYear::federal(year, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()).unwrap();
        for color in ColorOfMoney::ALL {
            let expiration = FundsControl::default_expiration(&fy, color).unwrap();
            prop_assert!(expiration >= fy.end_date);
        }
    }
}
