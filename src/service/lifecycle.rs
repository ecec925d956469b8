//! Leave request creation, draft mutation, submission, cancellation,
//! deletion and filtered listing.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use super::emit_audit;
use crate::audit::{AuditEvent, AuditLog};
use crate::cache::BalanceCache;
use crate::error::{LeaveError, LeaveResult};
use crate::model::{
    current_leave_year, Actor, CreateLeave, LeaveRequest, LeaveRequestFilter, LeaveRequestPatch,
    LeaveStatus,
};
use crate::service::BalanceService;
use crate::store::LeaveStore;

/// Requests are booked in half-day steps.
fn min_leave_days() -> Decimal {
    Decimal::new(5, 1)
}

/// Owns the request state machine up to submission. The approve/reject
/// transition lives in the approval workflow; balance lookups go through
/// the calculation component.
pub struct LeaveRequestService<S, C, A> {
    store: Arc<S>,
    balances: Arc<BalanceService<S, C, A>>,
    audit: Arc<A>,
}

impl<S, C, A> LeaveRequestService<S, C, A>
where
    S: LeaveStore,
    C: BalanceCache,
    A: AuditLog,
{
    pub fn new(store: Arc<S>, balances: Arc<BalanceService<S, C, A>>, audit: Arc<A>) -> Self {
        LeaveRequestService {
            store,
            balances,
            audit,
        }
    }

    /// Create a draft owned by the actor.
    ///
    /// The balance check here is advisory: it reads the current-year
    /// balance outside any transaction and blocks obviously oversized
    /// requests early. The authoritative check runs inside the approval
    /// transaction.
    pub async fn create(&self, actor: &Actor, new: CreateLeave) -> LeaveResult<LeaveRequest> {
        if new.end_date < new.start_date {
            return Err(LeaveError::validation("start_date cannot be after end_date"));
        }
        if new.total_days < min_leave_days() {
            return Err(LeaveError::validation("total_days must be at least 0.5"));
        }
        if !self.balances.is_valid_leave_type(new.leave_type, &new.country) {
            return Err(LeaveError::InvalidLeaveType {
                leave_type: new.leave_type,
                country: new.country.clone(),
            });
        }

        let overlapping = self
            .store
            .overlapping_requests(actor.user_id, new.start_date, new.end_date, None)
            .await?;
        if !overlapping.is_empty() {
            return Err(LeaveError::Overlap {
                start: new.start_date,
                end: new.end_date,
            });
        }

        let year = current_leave_year();
        if let Some(balance) = self
            .balances
            .available(actor.user_id, &new.country, new.leave_type, year)
            .await?
        {
            if new.total_days > balance.available_days {
                return Err(LeaveError::InsufficientBalance {
                    leave_type: new.leave_type,
                    requested: new.total_days,
                    available: balance.available_days,
                });
            }
        }

        let request = self.store.insert_request(actor.user_id, &new).await?;
        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.created",
                "leave_request",
                request.id,
                actor.user_id,
                &actor.role,
                json!({
                    "leave_type": request.leave_type,
                    "country": request.country,
                    "start_date": request.start_date,
                    "end_date": request.end_date,
                    "total_days": request.total_days,
                    "status": request.status,
                }),
            ),
        )
        .await;
        Ok(request)
    }

    /// Mutate a draft. Owner only; date changes re-run the ordering and
    /// overlap validation (excluding the request itself), day changes
    /// re-run the advisory balance check.
    pub async fn update(
        &self,
        actor: &Actor,
        id: u64,
        patch: LeaveRequestPatch,
    ) -> LeaveResult<LeaveRequest> {
        let current = self.owned_request(actor, id, "modify").await?;
        if current.status != LeaveStatus::Draft {
            return Err(LeaveError::InvalidState {
                expected: LeaveStatus::Draft,
                actual: current.status,
            });
        }
        if patch.is_empty() {
            return Err(LeaveError::validation("no fields provided for update"));
        }

        let start_date = patch.start_date.unwrap_or(current.start_date);
        let end_date = patch.end_date.unwrap_or(current.end_date);
        if end_date < start_date {
            return Err(LeaveError::validation("start_date cannot be after end_date"));
        }
        if patch.touches_dates() {
            let overlapping = self
                .store
                .overlapping_requests(actor.user_id, start_date, end_date, Some(id))
                .await?;
            if !overlapping.is_empty() {
                return Err(LeaveError::Overlap {
                    start: start_date,
                    end: end_date,
                });
            }
        }
        if let Some(total_days) = patch.total_days {
            if total_days < min_leave_days() {
                return Err(LeaveError::validation("total_days must be at least 0.5"));
            }
            let year = current_leave_year();
            if let Some(balance) = self
                .balances
                .available(actor.user_id, &current.country, current.leave_type, year)
                .await?
            {
                if total_days > balance.available_days {
                    return Err(LeaveError::InsufficientBalance {
                        leave_type: current.leave_type,
                        requested: total_days,
                        available: balance.available_days,
                    });
                }
            }
        }

        let updated = self.store.update_request(id, &patch).await?;
        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.updated",
                "leave_request",
                id,
                actor.user_id,
                &actor.role,
                json!({
                    "start_date": patch.start_date,
                    "end_date": patch.end_date,
                    "total_days": patch.total_days,
                    "is_paid": patch.is_paid,
                }),
            ),
        )
        .await;
        Ok(updated)
    }

    /// Draft -> submitted, owner only.
    pub async fn submit(&self, actor: &Actor, id: u64) -> LeaveResult<LeaveRequest> {
        let current = self.owned_request(actor, id, "submit").await?;
        if current.status != LeaveStatus::Draft {
            return Err(LeaveError::InvalidState {
                expected: LeaveStatus::Draft,
                actual: current.status,
            });
        }

        let updated = self
            .store
            .set_request_status(id, LeaveStatus::Submitted)
            .await?;
        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.submitted",
                "leave_request",
                id,
                actor.user_id,
                &actor.role,
                json!({ "from": current.status, "to": updated.status }),
            ),
        )
        .await;
        Ok(updated)
    }

    /// Draft or submitted -> cancelled, owner only. The audit event keeps
    /// the status the request was cancelled from.
    pub async fn cancel(&self, actor: &Actor, id: u64) -> LeaveResult<LeaveRequest> {
        let current = self.owned_request(actor, id, "cancel").await?;
        if !current.status.can_cancel() {
            return Err(LeaveError::validation(
                "only draft or submitted requests can be cancelled",
            ));
        }

        let updated = self
            .store
            .set_request_status(id, LeaveStatus::Cancelled)
            .await?;
        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.cancelled",
                "leave_request",
                id,
                actor.user_id,
                &actor.role,
                json!({ "from": current.status, "to": updated.status }),
            ),
        )
        .await;
        Ok(updated)
    }

    /// Hard delete, drafts only, owner only.
    pub async fn remove(&self, actor: &Actor, id: u64) -> LeaveResult<()> {
        let current = self.owned_request(actor, id, "delete").await?;
        if current.status != LeaveStatus::Draft {
            return Err(LeaveError::InvalidState {
                expected: LeaveStatus::Draft,
                actual: current.status,
            });
        }

        if !self.store.delete_request(id).await? {
            return Err(LeaveError::NotFound { id });
        }
        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_request.deleted",
                "leave_request",
                id,
                actor.user_id,
                &actor.role,
                json!({ "status": current.status }),
            ),
        )
        .await;
        Ok(())
    }

    pub async fn get(&self, id: u64) -> LeaveResult<LeaveRequest> {
        self.store
            .request_by_id(id)
            .await?
            .ok_or(LeaveError::NotFound { id })
    }

    /// Filtered listing. The row scope inside the filter comes from the
    /// authorization collaborator.
    pub async fn find_all(&self, filter: &LeaveRequestFilter) -> LeaveResult<Vec<LeaveRequest>> {
        Ok(self.store.find_requests(filter).await?)
    }

    async fn owned_request(
        &self,
        actor: &Actor,
        id: u64,
        verb: &str,
    ) -> LeaveResult<LeaveRequest> {
        let request = self.get(id).await?;
        if request.user_id != actor.user_id {
            return Err(LeaveError::forbidden(format!(
                "only the owner can {verb} a leave request"
            )));
        }
        Ok(request)
    }
}
