use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Lifecycle states of a leave request.
///
/// ```text
/// draft     -> submitted | cancelled
/// submitted -> approved | rejected | cancelled
/// ```
/// Approved, rejected and cancelled are terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled
        )
    }

    /// Only submitted and approved requests block the calendar for the
    /// overlap check.
    pub fn blocks_calendar(&self) -> bool {
        matches!(self, LeaveStatus::Submitted | LeaveStatus::Approved)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, LeaveStatus::Draft | LeaveStatus::Submitted)
    }
}

/// Country-scoped leave categories. The catalog decides which of these a
/// given country accepts; adding a country means extending both.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveType {
    AnnualLeaveIn,
    SickLeaveIn,
    CasualLeaveIn,
    MaternityLeaveIn,
    PaternityLeaveIn,
    UnpaidLeaveIn,
    VacationLeavePh,
    SickLeavePh,
    MaternityLeavePh,
    PaternityLeavePh,
    UnpaidLeavePh,
    AnnualLeaveAu,
    PersonalLeaveAu,
    CompassionateLeaveAu,
    LongServiceLeaveAu,
    UnpaidLeaveAu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: u64,
    pub user_id: u64,
    pub country: String,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: Decimal,
    pub status: LeaveStatus,
    pub is_paid: bool,
    pub notes: Option<String>,
    pub payroll_period: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveRequest {
    /// Inclusive date-range intersection.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

/// Create payload; the owner comes from the calling actor.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLeave {
    pub country: String,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: Decimal,
    pub is_paid: bool,
    pub notes: Option<String>,
    pub payroll_period: Option<String>,
}

/// Draft-only mutation. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaveRequestPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_days: Option<Decimal>,
    pub is_paid: Option<bool>,
    pub notes: Option<String>,
    pub payroll_period: Option<String>,
}

impl LeaveRequestPatch {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none()
            && self.end_date.is_none()
            && self.total_days.is_none()
            && self.is_paid.is_none()
            && self.notes.is_none()
            && self.payroll_period.is_none()
    }

    pub fn touches_dates(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    pub fn apply_to(&self, request: &mut LeaveRequest) {
        if let Some(start_date) = self.start_date {
            request.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            request.end_date = end_date;
        }
        if let Some(total_days) = self.total_days {
            request.total_days = total_days;
        }
        if let Some(is_paid) = self.is_paid {
            request.is_paid = is_paid;
        }
        if let Some(notes) = self.notes.as_ref() {
            request.notes = Some(notes.clone());
        }
        if let Some(payroll_period) = self.payroll_period.as_ref() {
            request.payroll_period = Some(payroll_period.clone());
        }
    }
}

/// Query filters for listing requests. `scope_user_ids` is the row-level
/// scope supplied by the authorization collaborator (e.g. the employees of
/// one client); the core only applies it, it never computes it.
#[derive(Debug, Clone, Default)]
pub struct LeaveRequestFilter {
    pub status: Option<LeaveStatus>,
    pub user_id: Option<u64>,
    pub country: Option<String>,
    pub leave_type: Option<LeaveType>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub scope_user_ids: Option<Vec<u64>>,
}

impl LeaveRequestFilter {
    pub fn matches(&self, request: &LeaveRequest) -> bool {
        if let Some(status) = self.status {
            if request.status != status {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if request.user_id != user_id {
                return false;
            }
        }
        if let Some(country) = self.country.as_deref() {
            if request.country != country {
                return false;
            }
        }
        if let Some(leave_type) = self.leave_type {
            if request.leave_type != leave_type {
                return false;
            }
        }
        if let Some(from) = self.from {
            if request.end_date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if request.start_date > to {
                return false;
            }
        }
        if let Some(scope) = self.scope_user_ids.as_ref() {
            if !scope.contains(&request.user_id) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(start: NaiveDate, end: NaiveDate) -> LeaveRequest {
        LeaveRequest {
            id: 1,
            user_id: 10,
            country: "IN".into(),
            leave_type: LeaveType::AnnualLeaveIn,
            start_date: start,
            end_date: end,
            total_days: dec!(3),
            status: LeaveStatus::Submitted,
            is_paid: true,
            notes: None,
            payroll_period: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn overlap_is_inclusive_on_boundaries() {
        let req = sample(date(2025, 1, 10), date(2025, 1, 12));
        // touching the end date still counts
        assert!(req.overlaps(date(2025, 1, 12), date(2025, 1, 15)));
        assert!(req.overlaps(date(2025, 1, 8), date(2025, 1, 10)));
        assert!(!req.overlaps(date(2025, 1, 13), date(2025, 1, 15)));
        assert!(!req.overlaps(date(2025, 1, 1), date(2025, 1, 9)));
    }

    #[test]
    fn status_string_forms_round_trip() {
        assert_eq!(LeaveStatus::Submitted.to_string(), "submitted");
        assert_eq!(
            "cancelled".parse::<LeaveStatus>().unwrap(),
            LeaveStatus::Cancelled
        );
    }

    #[test]
    fn leave_type_string_forms_round_trip() {
        assert_eq!(LeaveType::AnnualLeaveIn.to_string(), "ANNUAL_LEAVE_IN");
        assert_eq!(
            "VACATION_LEAVE_PH".parse::<LeaveType>().unwrap(),
            LeaveType::VacationLeavePh
        );
    }

    #[test]
    fn terminal_states() {
        assert!(LeaveStatus::Approved.is_terminal());
        assert!(LeaveStatus::Rejected.is_terminal());
        assert!(LeaveStatus::Cancelled.is_terminal());
        assert!(!LeaveStatus::Draft.is_terminal());
        assert!(!LeaveStatus::Submitted.is_terminal());
    }

    #[test]
    fn filter_applies_scope() {
        let req = sample(date(2025, 3, 1), date(2025, 3, 2));
        let mut filter = LeaveRequestFilter::default();
        assert!(filter.matches(&req));

        filter.scope_user_ids = Some(vec![99]);
        assert!(!filter.matches(&req));

        filter.scope_user_ids = Some(vec![10, 99]);
        assert!(filter.matches(&req));
    }
}
