//! Deterministic in-process store for tests and single-node embedding.
//!
//! A transaction takes the whole-state lock for its duration and mutates a
//! staged copy; commit swaps the copy in, drop discards it. Coarser than
//! the MySQL row locks but gives the same guarantee: a balance read inside
//! a transaction cannot race another writer.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LeaveStore, LeaveTxn, StoreError, StoreResult};
use crate::model::{
    CreateLeave, LeaveApproval, LeaveBalance, LeaveRequest, LeaveRequestFilter, LeaveRequestPatch,
    LeaveStatus, LeaveType, NewLeaveApproval, NewLeaveBalance,
};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    requests: BTreeMap<u64, LeaveRequest>,
    approvals: BTreeMap<u64, LeaveApproval>,
    balances: BTreeMap<u64, LeaveBalance>,
    next_request_id: u64,
    next_approval_id: u64,
    next_balance_id: u64,
}

impl MemoryState {
    fn insert_request(&mut self, user_id: u64, new: &CreateLeave) -> LeaveRequest {
        self.next_request_id += 1;
        let now = Utc::now();
        let request = LeaveRequest {
            id: self.next_request_id,
            user_id,
            country: new.country.clone(),
            leave_type: new.leave_type,
            start_date: new.start_date,
            end_date: new.end_date,
            total_days: new.total_days,
            status: LeaveStatus::Draft,
            is_paid: new.is_paid,
            notes: new.notes.clone(),
            payroll_period: new.payroll_period.clone(),
            created_at: now,
            updated_at: now,
        };
        self.requests.insert(request.id, request.clone());
        request
    }

    fn update_request(&mut self, id: u64, patch: &LeaveRequestPatch) -> StoreResult<LeaveRequest> {
        let request = self.requests.get_mut(&id).ok_or(StoreError::RowNotFound)?;
        patch.apply_to(request);
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    fn set_request_status(&mut self, id: u64, status: LeaveStatus) -> StoreResult<LeaveRequest> {
        let request = self.requests.get_mut(&id).ok_or(StoreError::RowNotFound)?;
        request.status = status;
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    fn find_requests(&self, filter: &LeaveRequestFilter) -> Vec<LeaveRequest> {
        let mut rows: Vec<LeaveRequest> = self
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows
    }

    fn overlapping_requests(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<u64>,
    ) -> Vec<LeaveRequest> {
        self.requests
            .values()
            .filter(|r| {
                r.user_id == user_id
                    && r.status.blocks_calendar()
                    && exclude != Some(r.id)
                    && r.overlaps(start, end)
            })
            .cloned()
            .collect()
    }

    fn insert_approval(&mut self, new: NewLeaveApproval) -> LeaveApproval {
        self.next_approval_id += 1;
        let approval = LeaveApproval {
            id: self.next_approval_id,
            leave_request_id: new.leave_request_id,
            approver_id: new.approver_id,
            status: new.status,
            comments: new.comments,
            decided_at: new.decided_at,
        };
        self.approvals.insert(approval.id, approval.clone());
        approval
    }

    fn approvals_for(&self, leave_request_id: u64) -> Vec<LeaveApproval> {
        let mut rows: Vec<LeaveApproval> = self
            .approvals
            .values()
            .filter(|a| a.leave_request_id == leave_request_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.decided_at.cmp(&a.decided_at).then(b.id.cmp(&a.id)));
        rows
    }

    fn balance_for(
        &self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> Option<LeaveBalance> {
        self.balances
            .values()
            .find(|b| {
                b.user_id == user_id
                    && b.country == country
                    && b.leave_type == leave_type
                    && b.year == year
            })
            .cloned()
    }

    fn balances_for(&self, user_id: u64, country: &str, year: i32) -> Vec<LeaveBalance> {
        self.balances
            .values()
            .filter(|b| b.user_id == user_id && b.country == country && b.year == year)
            .cloned()
            .collect()
    }

    fn insert_balance_if_absent(&mut self, new: &NewLeaveBalance) -> Option<LeaveBalance> {
        let exists = self
            .balance_for(new.user_id, &new.country, new.leave_type, new.year)
            .is_some();
        if exists {
            return None;
        }
        self.next_balance_id += 1;
        let balance = LeaveBalance {
            id: self.next_balance_id,
            user_id: new.user_id,
            country: new.country.clone(),
            leave_type: new.leave_type,
            year: new.year,
            total_days: new.total_days,
            used_days: Decimal::ZERO,
            available_days: new.total_days,
            accrual_rate: new.accrual_rate,
        };
        self.balances.insert(balance.id, balance.clone());
        Some(balance)
    }

    fn update_balance(&mut self, updated: &LeaveBalance) -> StoreResult<()> {
        let balance = self
            .balances
            .get_mut(&updated.id)
            .ok_or(StoreError::RowNotFound)?;
        *balance = updated.clone();
        Ok(())
    }

    fn balance_holders(&self, year: i32) -> Vec<(u64, String)> {
        let mut holders: Vec<(u64, String)> = self
            .balances
            .values()
            .filter(|b| b.year == year)
            .map(|b| (b.user_id, b.country.clone()))
            .collect();
        holders.sort();
        holders.dedup();
        holders
    }
}

#[derive(Clone, Default)]
pub struct MemoryLeaveStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTxn {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl LeaveStore for MemoryLeaveStore {
    type Txn = MemoryTxn;

    async fn begin(&self) -> StoreResult<MemoryTxn> {
        let guard = self.state.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(MemoryTxn { guard, staged })
    }

    async fn insert_request(&self, user_id: u64, new: &CreateLeave) -> StoreResult<LeaveRequest> {
        Ok(self.state.lock().await.insert_request(user_id, new))
    }

    async fn request_by_id(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.state.lock().await.requests.get(&id).cloned())
    }

    async fn update_request(
        &self,
        id: u64,
        patch: &LeaveRequestPatch,
    ) -> StoreResult<LeaveRequest> {
        self.state.lock().await.update_request(id, patch)
    }

    async fn set_request_status(
        &self,
        id: u64,
        status: LeaveStatus,
    ) -> StoreResult<LeaveRequest> {
        self.state.lock().await.set_request_status(id, status)
    }

    async fn delete_request(&self, id: u64) -> StoreResult<bool> {
        Ok(self.state.lock().await.requests.remove(&id).is_some())
    }

    async fn find_requests(&self, filter: &LeaveRequestFilter) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self.state.lock().await.find_requests(filter))
    }

    async fn overlapping_requests(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<u64>,
    ) -> StoreResult<Vec<LeaveRequest>> {
        Ok(self
            .state
            .lock()
            .await
            .overlapping_requests(user_id, start, end, exclude))
    }

    async fn approvals_for(&self, leave_request_id: u64) -> StoreResult<Vec<LeaveApproval>> {
        Ok(self.state.lock().await.approvals_for(leave_request_id))
    }

    async fn balance_for(
        &self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> StoreResult<Option<LeaveBalance>> {
        Ok(self
            .state
            .lock()
            .await
            .balance_for(user_id, country, leave_type, year))
    }

    async fn balances_for(
        &self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> StoreResult<Vec<LeaveBalance>> {
        Ok(self.state.lock().await.balances_for(user_id, country, year))
    }

    async fn insert_balance_if_absent(
        &self,
        new: &NewLeaveBalance,
    ) -> StoreResult<Option<LeaveBalance>> {
        Ok(self.state.lock().await.insert_balance_if_absent(new))
    }

    async fn balance_holders(&self, year: i32) -> StoreResult<Vec<(u64, String)>> {
        Ok(self.state.lock().await.balance_holders(year))
    }
}

#[async_trait]
impl LeaveTxn for MemoryTxn {
    async fn request_for_update(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        Ok(self.staged.requests.get(&id).cloned())
    }

    async fn set_request_status(
        &mut self,
        id: u64,
        status: LeaveStatus,
    ) -> StoreResult<LeaveRequest> {
        self.staged.set_request_status(id, status)
    }

    async fn insert_approval(&mut self, new: NewLeaveApproval) -> StoreResult<LeaveApproval> {
        Ok(self.staged.insert_approval(new))
    }

    async fn balance_for_update(
        &mut self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> StoreResult<Option<LeaveBalance>> {
        Ok(self.staged.balance_for(user_id, country, leave_type, year))
    }

    async fn balances_for_update(
        &mut self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> StoreResult<Vec<LeaveBalance>> {
        Ok(self.staged.balances_for(user_id, country, year))
    }

    async fn update_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()> {
        self.staged.update_balance(balance)
    }

    async fn commit(self) -> StoreResult<()> {
        let MemoryTxn { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        // staged copy is simply discarded
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create(start: NaiveDate, end: NaiveDate) -> CreateLeave {
        CreateLeave {
            country: "IN".into(),
            leave_type: LeaveType::AnnualLeaveIn,
            start_date: start,
            end_date: end,
            total_days: dec!(3),
            is_paid: true,
            notes: None,
            payroll_period: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_draft_status() {
        let store = MemoryLeaveStore::new();
        let first = store
            .insert_request(10, &create(date(2025, 1, 10), date(2025, 1, 12)))
            .await
            .unwrap();
        let second = store
            .insert_request(10, &create(date(2025, 2, 1), date(2025, 2, 2)))
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, LeaveStatus::Draft);
    }

    #[tokio::test]
    async fn committed_txn_is_visible() {
        let store = MemoryLeaveStore::new();
        let req = store
            .insert_request(10, &create(date(2025, 1, 10), date(2025, 1, 12)))
            .await
            .unwrap();

        let mut txn = store.begin().await.unwrap();
        txn.set_request_status(req.id, LeaveStatus::Submitted)
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let reloaded = store.request_by_id(req.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, LeaveStatus::Submitted);
    }

    #[tokio::test]
    async fn dropped_txn_rolls_back() {
        let store = MemoryLeaveStore::new();
        let req = store
            .insert_request(10, &create(date(2025, 1, 10), date(2025, 1, 12)))
            .await
            .unwrap();

        {
            let mut txn = store.begin().await.unwrap();
            txn.set_request_status(req.id, LeaveStatus::Submitted)
                .await
                .unwrap();
            // dropped without commit
        }

        let reloaded = store.request_by_id(req.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, LeaveStatus::Draft);
    }

    #[tokio::test]
    async fn balance_insert_is_idempotent() {
        let store = MemoryLeaveStore::new();
        let new = NewLeaveBalance {
            user_id: 10,
            country: "IN".into(),
            leave_type: LeaveType::AnnualLeaveIn,
            year: 2025,
            total_days: dec!(21),
            accrual_rate: dec!(1.75),
        };
        assert!(store.insert_balance_if_absent(&new).await.unwrap().is_some());
        assert!(store.insert_balance_if_absent(&new).await.unwrap().is_none());
        assert_eq!(store.balances_for(10, "IN", 2025).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlap_query_skips_draft_and_excluded() {
        let store = MemoryLeaveStore::new();
        let draft = store
            .insert_request(10, &create(date(2025, 1, 10), date(2025, 1, 12)))
            .await
            .unwrap();
        let submitted = store
            .insert_request(10, &create(date(2025, 1, 20), date(2025, 1, 22)))
            .await
            .unwrap();
        store
            .set_request_status(submitted.id, LeaveStatus::Submitted)
            .await
            .unwrap();

        // draft rows never block
        let hits = store
            .overlapping_requests(10, date(2025, 1, 11), date(2025, 1, 11), None)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(draft.status, LeaveStatus::Draft);

        let hits = store
            .overlapping_requests(10, date(2025, 1, 22), date(2025, 1, 25), None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let hits = store
            .overlapping_requests(10, date(2025, 1, 22), date(2025, 1, 25), Some(submitted.id))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
