use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::LeaveStatus;

/// Immutable audit row written exactly once per approve/reject decision.
/// Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveApproval {
    pub id: u64,
    pub leave_request_id: u64,
    pub approver_id: u64,
    /// Resulting status: approved or rejected only.
    pub status: LeaveStatus,
    pub comments: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLeaveApproval {
    pub leave_request_id: u64,
    pub approver_id: u64,
    pub status: LeaveStatus,
    pub comments: Option<String>,
    pub decided_at: DateTime<Utc>,
}
