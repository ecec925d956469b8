pub mod leave_approval;
pub mod leave_balance;
pub mod leave_request;

pub use leave_approval::{LeaveApproval, NewLeaveApproval};
pub use leave_balance::{BalanceSummary, LeaveBalance, NewLeaveBalance};
pub use leave_request::{
    CreateLeave, LeaveRequest, LeaveRequestFilter, LeaveRequestPatch, LeaveStatus, LeaveType,
};

use chrono::{Datelike, Utc};

/// Caller identity handed in by the authorization layer. Role checks happen
/// outside the core; the role string only feeds audit events.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: u64,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: u64, role: impl Into<String>) -> Self {
        Actor {
            user_id,
            role: role.into(),
        }
    }
}

/// Balance rows are scoped to the calendar year of the decision.
pub fn current_leave_year() -> i32 {
    Utc::now().year()
}
