//! The approve/reject transition. This is the only place the balance
//! ledger is debited, and the debit always happens inside one store
//! transaction together with the status flip and the approval row.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::emit_audit;
use crate::audit::{AuditEvent, AuditLog};
use crate::cache::BalanceCache;
use crate::error::{LeaveError, LeaveResult};
use crate::model::{
    current_leave_year, Actor, LeaveApproval, LeaveRequest, LeaveStatus, NewLeaveApproval,
};
use crate::service::BalanceService;
use crate::store::{LeaveStore, LeaveTxn};

/// The decided request together with its full approval history, most
/// recent decision first.
#[derive(Debug, Clone)]
pub struct DecidedLeave {
    pub request: LeaveRequest,
    pub history: Vec<LeaveApproval>,
}

#[derive(Debug, Clone)]
pub struct BulkFailure {
    pub id: u64,
    pub reason: String,
}

/// Partition of a bulk approval: ids that went through and ids that
/// failed, with the reason each one failed.
#[derive(Debug, Clone, Default)]
pub struct BulkApproveOutcome {
    pub approved: Vec<u64>,
    pub failed: Vec<BulkFailure>,
}

pub struct ApprovalService<S, C, A> {
    store: Arc<S>,
    balances: Arc<BalanceService<S, C, A>>,
    audit: Arc<A>,
}

impl<S, C, A> ApprovalService<S, C, A>
where
    S: LeaveStore,
    C: BalanceCache,
    A: AuditLog,
{
    pub fn new(store: Arc<S>, balances: Arc<BalanceService<S, C, A>>, audit: Arc<A>) -> Self {
        ApprovalService {
            store,
            balances,
            audit,
        }
    }

    /// Approve a submitted request.
    ///
    /// The whole transition is one transaction: locking read of request
    /// and balance, authoritative availability check, status flip,
    /// approval row, ledger debit. Any failure drops the transaction and
    /// rolls everything back, leaving the request submitted and the
    /// balance untouched. The cached balance views are invalidated only
    /// after the commit.
    pub async fn approve(
        &self,
        actor: &Actor,
        id: u64,
        comments: Option<String>,
    ) -> LeaveResult<DecidedLeave> {
        let mut txn = self.store.begin().await?;

        let request = txn
            .request_for_update(id)
            .await?
            .ok_or(LeaveError::NotFound { id })?;
        if request.status != LeaveStatus::Submitted {
            return Err(LeaveError::InvalidState {
                expected: LeaveStatus::Submitted,
                actual: request.status,
            });
        }

        let year = current_leave_year();
        let balance = txn
            .balance_for_update(request.user_id, &request.country, request.leave_type, year)
            .await?;
        if let Some(balance) = &balance {
            if request.total_days > balance.available_days {
                return Err(LeaveError::InsufficientBalance {
                    leave_type: request.leave_type,
                    requested: request.total_days,
                    available: balance.available_days,
                });
            }
        }

        let updated = txn.set_request_status(id, LeaveStatus::Approved).await?;
        txn.insert_approval(NewLeaveApproval {
            leave_request_id: id,
            approver_id: actor.user_id,
            status: LeaveStatus::Approved,
            comments: comments.clone(),
            decided_at: Utc::now(),
        })
        .await?;
        if let Some(mut balance) = balance {
            balance.debit(request.total_days);
            txn.update_balance(&balance).await?;
        }
        txn.commit().await?;

        // strictly after the commit
        self.balances
            .invalidate(request.user_id, &request.country, year)
            .await;
        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.approved",
                "leave_request",
                id,
                actor.user_id,
                &actor.role,
                json!({
                    "from": LeaveStatus::Submitted,
                    "to": LeaveStatus::Approved,
                    "comments": comments,
                }),
            ),
        )
        .await;

        let history = self.store.approvals_for(id).await?;
        Ok(DecidedLeave {
            request: updated,
            history,
        })
    }

    /// Reject a submitted request. A rejection always carries a reason;
    /// the ledger is not touched.
    pub async fn reject(
        &self,
        actor: &Actor,
        id: u64,
        comments: &str,
    ) -> LeaveResult<DecidedLeave> {
        let comments = comments.trim();
        if comments.is_empty() {
            return Err(LeaveError::validation("rejection requires a comment"));
        }

        let mut txn = self.store.begin().await?;
        let request = txn
            .request_for_update(id)
            .await?
            .ok_or(LeaveError::NotFound { id })?;
        if request.status != LeaveStatus::Submitted {
            return Err(LeaveError::InvalidState {
                expected: LeaveStatus::Submitted,
                actual: request.status,
            });
        }

        let updated = txn.set_request_status(id, LeaveStatus::Rejected).await?;
        txn.insert_approval(NewLeaveApproval {
            leave_request_id: id,
            approver_id: actor.user_id,
            status: LeaveStatus::Rejected,
            comments: Some(comments.to_string()),
            decided_at: Utc::now(),
        })
        .await?;
        txn.commit().await?;

        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.rejected",
                "leave_request",
                id,
                actor.user_id,
                &actor.role,
                json!({
                    "from": LeaveStatus::Submitted,
                    "to": LeaveStatus::Rejected,
                    "comments": comments,
                }),
            ),
        )
        .await;

        let history = self.store.approvals_for(id).await?;
        Ok(DecidedLeave {
            request: updated,
            history,
        })
    }

    /// Approve a batch sequentially, in the order supplied.
    ///
    /// Sequential processing is load-bearing: when two ids draw on the
    /// same balance row, the earlier item's committed debit must be
    /// visible to the later item's authoritative check, so the batch fails
    /// cleanly once the balance is exhausted. Item errors are folded into
    /// the failed list; the batch itself never aborts.
    pub async fn bulk_approve(
        &self,
        actor: &Actor,
        ids: &[u64],
        comments: Option<String>,
    ) -> BulkApproveOutcome {
        let mut outcome = BulkApproveOutcome::default();
        for &id in ids {
            match self.approve(actor, id, comments.clone()).await {
                Ok(decided) => outcome.approved.push(decided.request.id),
                Err(error) => outcome.failed.push(BulkFailure {
                    id,
                    reason: error.to_string(),
                }),
            }
        }

        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.bulk_approved",
                "leave_request",
                "bulk",
                actor.user_id,
                &actor.role,
                json!({
                    "requested": ids.len(),
                    "approved": outcome.approved.len(),
                    "failed": outcome.failed.len(),
                }),
            ),
        )
        .await;
        outcome
    }

    /// Approval rows for a request, most recent first.
    pub async fn approval_history(&self, id: u64) -> LeaveResult<Vec<LeaveApproval>> {
        self.store
            .request_by_id(id)
            .await?
            .ok_or(LeaveError::NotFound { id })?;
        Ok(self.store.approvals_for(id).await?)
    }
}
