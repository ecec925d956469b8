pub mod approval;
pub mod balance;
pub mod lifecycle;

pub use approval::{ApprovalService, BulkApproveOutcome, BulkFailure, DecidedLeave};
pub use balance::BalanceService;
pub use lifecycle::LeaveRequestService;

use crate::audit::{AuditEvent, AuditLog};

/// Audit writes are best-effort: transactions have already committed by the
/// time events are emitted, so a failing sink must not fail the operation.
pub(crate) async fn emit_audit<A: AuditLog>(audit: &A, event: AuditEvent) {
    if let Err(error) = audit.log(event).await {
        tracing::warn!(error = %error, "audit sink rejected event");
    }
}
