use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::LeaveCatalog;
use crate::error::{LeaveError, LeaveResult};
use crate::model::LeaveType;

/// Monetary figures are held to two decimal places, matching the DECIMAL(6,2)
/// balance columns. `round_dp` applies banker's rounding.
const MONEY_DP: u32 = 2;

/// Pure payroll-impact result consumed by the external payroll component.
/// Exactly one of the two amounts is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaveImpact {
    pub daily_rate: Decimal,
    pub paid_amount: Decimal,
    pub deduction_amount: Decimal,
}

/// Stateless calculation feeding payroll disbursement (which is out of
/// scope): `daily_rate = base_salary / working_days_per_month(country)`.
/// Paid leave surfaces as a paid amount, unpaid leave as a deduction.
pub fn calculate_leave_impact(
    catalog: &LeaveCatalog,
    leave_type: LeaveType,
    total_days: Decimal,
    is_paid: bool,
    base_salary: Decimal,
    country: &str,
) -> LeaveResult<LeaveImpact> {
    if !catalog.is_valid(leave_type, country) {
        return Err(LeaveError::InvalidLeaveType {
            leave_type,
            country: country.to_string(),
        });
    }
    if base_salary < Decimal::ZERO {
        return Err(LeaveError::validation("base salary cannot be negative"));
    }
    if total_days <= Decimal::ZERO {
        return Err(LeaveError::validation("total days must be positive"));
    }

    let working_days = Decimal::from(catalog.working_days_per_month(country));
    let daily_rate = (base_salary / working_days).round_dp(MONEY_DP);
    let amount = (daily_rate * total_days).round_dp(MONEY_DP);

    let impact = if is_paid {
        LeaveImpact {
            daily_rate,
            paid_amount: amount,
            deduction_amount: Decimal::ZERO,
        }
    } else {
        LeaveImpact {
            daily_rate,
            paid_amount: Decimal::ZERO,
            deduction_amount: amount,
        }
    };
    Ok(impact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unpaid_philippines_leave_deducts_daily_rate() {
        // 2600 / 26 working days = 100 per day, 2 days unpaid
        let impact = calculate_leave_impact(
            LeaveCatalog::builtin(),
            LeaveType::VacationLeavePh,
            dec!(2),
            false,
            dec!(2600),
            "PH",
        )
        .unwrap();
        assert_eq!(impact.daily_rate, dec!(100));
        assert_eq!(impact.paid_amount, dec!(0));
        assert_eq!(impact.deduction_amount, dec!(200));
    }

    #[test]
    fn paid_india_leave_pays_daily_rate() {
        let impact = calculate_leave_impact(
            LeaveCatalog::builtin(),
            LeaveType::AnnualLeaveIn,
            dec!(3),
            true,
            dec!(52000),
            "IN",
        )
        .unwrap();
        assert_eq!(impact.daily_rate, dec!(2000));
        assert_eq!(impact.paid_amount, dec!(6000));
        assert_eq!(impact.deduction_amount, dec!(0));
    }

    #[test]
    fn australia_uses_22_working_days() {
        let impact = calculate_leave_impact(
            LeaveCatalog::builtin(),
            LeaveType::AnnualLeaveAu,
            dec!(1),
            true,
            dec!(2200),
            "AU",
        )
        .unwrap();
        assert_eq!(impact.daily_rate, dec!(100));
    }

    #[test]
    fn wrong_country_type_is_rejected() {
        let err = calculate_leave_impact(
            LeaveCatalog::builtin(),
            LeaveType::AnnualLeaveIn,
            dec!(1),
            true,
            dec!(1000),
            "PH",
        )
        .unwrap_err();
        assert!(matches!(err, LeaveError::InvalidLeaveType { .. }));
    }

    proptest! {
        /// One side of the impact is always zero and the other matches
        /// rate * days to two decimal places.
        #[test]
        fn impact_partitions_paid_and_unpaid(
            salary in 0u32..1_000_000u32,
            days_halves in 1u32..60u32,
            is_paid in proptest::bool::ANY,
        ) {
            let total_days = Decimal::from(days_halves) / Decimal::from(2u32);
            let impact = calculate_leave_impact(
                LeaveCatalog::builtin(),
                LeaveType::AnnualLeaveIn,
                total_days,
                is_paid,
                Decimal::from(salary),
                "IN",
            ).unwrap();

            let expected = (impact.daily_rate * total_days).round_dp(2);
            if is_paid {
                prop_assert_eq!(impact.paid_amount, expected);
                prop_assert_eq!(impact.deduction_amount, Decimal::ZERO);
            } else {
                prop_assert_eq!(impact.deduction_amount, expected);
                prop_assert_eq!(impact.paid_amount, Decimal::ZERO);
            }
        }
    }
}
