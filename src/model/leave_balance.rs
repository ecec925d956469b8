use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LeaveType;

/// One ledger row per (user, country, leave type, year).
///
/// Invariant after every mutation: `available_days == total_days - used_days`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub id: u64,
    pub user_id: u64,
    pub country: String,
    pub leave_type: LeaveType,
    pub year: i32,
    pub total_days: Decimal,
    pub used_days: Decimal,
    pub available_days: Decimal,
    /// Days added to `total_days` per monthly accrual cycle.
    pub accrual_rate: Decimal,
}

impl LeaveBalance {
    /// Re-establish the ledger invariant after touching total or used days.
    pub fn recompute_available(&mut self) {
        self.available_days = self.total_days - self.used_days;
    }

    /// Debit `days` against the balance. The caller has already performed
    /// the authoritative availability check inside the same transaction.
    pub fn debit(&mut self, days: Decimal) {
        self.used_days += days;
        self.recompute_available();
    }

    /// Apply one accrual cycle.
    pub fn accrue(&mut self) {
        self.total_days += self.accrual_rate;
        self.recompute_available();
    }

    pub fn invariant_holds(&self) -> bool {
        self.available_days == self.total_days - self.used_days
    }
}

#[derive(Debug, Clone)]
pub struct NewLeaveBalance {
    pub user_id: u64,
    pub country: String,
    pub leave_type: LeaveType,
    pub year: i32,
    pub total_days: Decimal,
    pub accrual_rate: Decimal,
}

/// Totals across every leave type of one (user, country, year) scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub user_id: u64,
    pub country: String,
    pub year: i32,
    pub total_days: Decimal,
    pub used_days: Decimal,
    pub available_days: Decimal,
    pub leave_types: usize,
}

impl BalanceSummary {
    pub fn from_rows(user_id: u64, country: &str, year: i32, rows: &[LeaveBalance]) -> Self {
        let mut summary = BalanceSummary {
            user_id,
            country: country.to_string(),
            year,
            total_days: Decimal::ZERO,
            used_days: Decimal::ZERO,
            available_days: Decimal::ZERO,
            leave_types: rows.len(),
        };
        for row in rows {
            summary.total_days += row.total_days;
            summary.used_days += row.used_days;
            summary.available_days += row.available_days;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance() -> LeaveBalance {
        LeaveBalance {
            id: 1,
            user_id: 10,
            country: "IN".into(),
            leave_type: LeaveType::AnnualLeaveIn,
            year: 2025,
            total_days: dec!(21),
            used_days: dec!(0),
            available_days: dec!(21),
            accrual_rate: dec!(1.75),
        }
    }

    #[test]
    fn debit_keeps_invariant() {
        let mut bal = balance();
        bal.debit(dec!(3));
        assert_eq!(bal.used_days, dec!(3));
        assert_eq!(bal.available_days, dec!(18));
        assert!(bal.invariant_holds());
    }

    #[test]
    fn accrue_keeps_invariant() {
        let mut bal = balance();
        bal.debit(dec!(2.5));
        bal.accrue();
        assert_eq!(bal.total_days, dec!(22.75));
        assert_eq!(bal.available_days, dec!(20.25));
        assert!(bal.invariant_holds());
    }

    #[test]
    fn summary_totals_across_types() {
        let mut second = balance();
        second.leave_type = LeaveType::SickLeaveIn;
        second.total_days = dec!(12);
        second.available_days = dec!(12);
        second.debit(dec!(4));

        let rows = vec![balance(), second];
        let summary = BalanceSummary::from_rows(10, "IN", 2025, &rows);
        assert_eq!(summary.leave_types, 2);
        assert_eq!(summary.total_days, dec!(33));
        assert_eq!(summary.used_days, dec!(4));
        assert_eq!(summary.available_days, dec!(29));
    }
}
