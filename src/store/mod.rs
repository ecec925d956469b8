pub mod memory;
pub mod mysql;

pub use memory::MemoryLeaveStore;
pub use mysql::MySqlLeaveStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{
    CreateLeave, LeaveApproval, LeaveBalance, LeaveRequest, LeaveRequestFilter, LeaveRequestPatch,
    LeaveStatus, LeaveType, NewLeaveApproval, NewLeaveBalance,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    RowNotFound,
    #[error("stored value could not be decoded: {0}")]
    Decode(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Transactional persistence over the three collections the core owns:
/// leave requests, approvals and balances.
///
/// Implementations assign row ids and creation timestamps; new requests
/// start in `draft` (mirroring the schema defaults).
#[async_trait]
pub trait LeaveStore: Send + Sync + 'static {
    type Txn: LeaveTxn;

    /// Open a multi-statement transaction scope.
    async fn begin(&self) -> StoreResult<Self::Txn>;

    async fn insert_request(&self, user_id: u64, new: &CreateLeave) -> StoreResult<LeaveRequest>;
    async fn request_by_id(&self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    async fn update_request(
        &self,
        id: u64,
        patch: &LeaveRequestPatch,
    ) -> StoreResult<LeaveRequest>;
    async fn set_request_status(&self, id: u64, status: LeaveStatus)
        -> StoreResult<LeaveRequest>;
    async fn delete_request(&self, id: u64) -> StoreResult<bool>;
    async fn find_requests(&self, filter: &LeaveRequestFilter) -> StoreResult<Vec<LeaveRequest>>;
    /// Submitted/approved requests of `user_id` whose inclusive date range
    /// intersects `[start, end]`, optionally excluding one id (updates).
    async fn overlapping_requests(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<u64>,
    ) -> StoreResult<Vec<LeaveRequest>>;

    /// Approval rows for a request, most recent first.
    async fn approvals_for(&self, leave_request_id: u64) -> StoreResult<Vec<LeaveApproval>>;

    async fn balance_for(
        &self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> StoreResult<Option<LeaveBalance>>;
    async fn balances_for(
        &self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> StoreResult<Vec<LeaveBalance>>;
    /// Create-if-absent on the (user, country, type, year) unique scope.
    /// Returns the new row, or None when one already existed (idempotent
    /// initialization never overwrites).
    async fn insert_balance_if_absent(
        &self,
        new: &NewLeaveBalance,
    ) -> StoreResult<Option<LeaveBalance>>;

    /// Distinct (user, country) scopes holding balances for a year. Feeds
    /// the external accrual scheduler and cache warmup.
    async fn balance_holders(&self, year: i32) -> StoreResult<Vec<(u64, String)>>;
}

/// One transaction scope. Reads taken here are locking reads so the
/// read-compute-write on a balance row cannot race a concurrent approval.
/// Dropping an uncommitted transaction rolls it back.
#[async_trait]
pub trait LeaveTxn: Send {
    async fn request_for_update(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>>;
    async fn set_request_status(&mut self, id: u64, status: LeaveStatus)
        -> StoreResult<LeaveRequest>;
    async fn insert_approval(&mut self, new: NewLeaveApproval) -> StoreResult<LeaveApproval>;
    async fn balance_for_update(
        &mut self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> StoreResult<Option<LeaveBalance>>;
    async fn balances_for_update(
        &mut self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> StoreResult<Vec<LeaveBalance>>;
    async fn update_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()>;

    async fn commit(self) -> StoreResult<()>
    where
        Self: Sized;
    async fn rollback(self) -> StoreResult<()>
    where
        Self: Sized;
}
