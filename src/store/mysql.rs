//! MySQL-backed store.
//!
//! Queries are bound at runtime so the crate builds without a live
//! database. Balance and request reads inside a transaction use
//! `SELECT ... FOR UPDATE`, which is what makes the approval's
//! read-compute-write on the ledger safe under concurrency.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use super::{LeaveStore, LeaveTxn, StoreError, StoreResult};
use crate::model::{
    CreateLeave, LeaveApproval, LeaveBalance, LeaveRequest, LeaveRequestFilter, LeaveRequestPatch,
    LeaveStatus, LeaveType, NewLeaveApproval, NewLeaveBalance,
};

const REQUEST_COLUMNS: &str = "id, user_id, country, leave_type, start_date, end_date, \
     total_days, status, is_paid, notes, payroll_period, created_at, updated_at";
const APPROVAL_COLUMNS: &str = "id, leave_request_id, approver_id, status, comments, decided_at";
const BALANCE_COLUMNS: &str = "id, user_id, country, leave_type, year, total_days, used_days, \
     available_days, accrual_rate";

/// Bindable value for dynamically built WHERE/SET clauses.
enum SqlValue {
    U64(u64),
    Str(String),
    Date(NaiveDate),
    Num(Decimal),
    Bool(bool),
}

#[derive(FromRow)]
struct LeaveRequestRow {
    id: u64,
    user_id: u64,
    country: String,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_days: Decimal,
    status: String,
    is_paid: bool,
    notes: Option<String>,
    payroll_period: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = StoreError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, StoreError> {
        let leave_type: LeaveType = row
            .leave_type
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown leave type {}", row.leave_type)))?;
        let status: LeaveStatus = row
            .status
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown status {}", row.status)))?;
        Ok(LeaveRequest {
            id: row.id,
            user_id: row.user_id,
            country: row.country,
            leave_type,
            status,
            start_date: row.start_date,
            end_date: row.end_date,
            total_days: row.total_days,
            is_paid: row.is_paid,
            notes: row.notes,
            payroll_period: row.payroll_period,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct LeaveApprovalRow {
    id: u64,
    leave_request_id: u64,
    approver_id: u64,
    status: String,
    comments: Option<String>,
    decided_at: DateTime<Utc>,
}

impl TryFrom<LeaveApprovalRow> for LeaveApproval {
    type Error = StoreError;

    fn try_from(row: LeaveApprovalRow) -> Result<Self, StoreError> {
        let status: LeaveStatus = row
            .status
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown status {}", row.status)))?;
        Ok(LeaveApproval {
            id: row.id,
            leave_request_id: row.leave_request_id,
            approver_id: row.approver_id,
            status,
            comments: row.comments,
            decided_at: row.decided_at,
        })
    }
}

#[derive(FromRow)]
struct LeaveBalanceRow {
    id: u64,
    user_id: u64,
    country: String,
    leave_type: String,
    year: i32,
    total_days: Decimal,
    used_days: Decimal,
    available_days: Decimal,
    accrual_rate: Decimal,
}

impl TryFrom<LeaveBalanceRow> for LeaveBalance {
    type Error = StoreError;

    fn try_from(row: LeaveBalanceRow) -> Result<Self, StoreError> {
        let leave_type: LeaveType = row
            .leave_type
            .parse()
            .map_err(|_| StoreError::Decode(format!("unknown leave type {}", row.leave_type)))?;
        Ok(LeaveBalance {
            id: row.id,
            user_id: row.user_id,
            country: row.country,
            leave_type,
            year: row.year,
            total_days: row.total_days,
            used_days: row.used_days,
            available_days: row.available_days,
            accrual_rate: row.accrual_rate,
        })
    }
}

#[derive(Clone)]
pub struct MySqlLeaveStore {
    pool: MySqlPool,
}

impl MySqlLeaveStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlLeaveStore { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = MySqlPool::connect(database_url).await?;
        Ok(MySqlLeaveStore { pool })
    }

    /// Apply the schema under ./migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn fetch_request(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ?");
        let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LeaveRequest::try_from).transpose()
    }
}

#[async_trait]
impl LeaveStore for MySqlLeaveStore {
    type Txn = MySqlTxn;

    async fn begin(&self) -> StoreResult<MySqlTxn> {
        let tx = self.pool.begin().await?;
        Ok(MySqlTxn { tx })
    }

    async fn insert_request(&self, user_id: u64, new: &CreateLeave) -> StoreResult<LeaveRequest> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_requests
                (user_id, country, leave_type, start_date, end_date,
                 total_days, is_paid, notes, payroll_period)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&new.country)
        .bind(new.leave_type.to_string())
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(new.total_days)
        .bind(new.is_paid)
        .bind(&new.notes)
        .bind(&new.payroll_period)
        .execute(&self.pool)
        .await?;

        self.fetch_request(result.last_insert_id())
            .await?
            .ok_or(StoreError::RowNotFound)
    }

    async fn request_by_id(&self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        self.fetch_request(id).await
    }

    async fn update_request(
        &self,
        id: u64,
        patch: &LeaveRequestPatch,
    ) -> StoreResult<LeaveRequest> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(start_date) = patch.start_date {
            sets.push("start_date = ?");
            values.push(SqlValue::Date(start_date));
        }
        if let Some(end_date) = patch.end_date {
            sets.push("end_date = ?");
            values.push(SqlValue::Date(end_date));
        }
        if let Some(total_days) = patch.total_days {
            sets.push("total_days = ?");
            values.push(SqlValue::Num(total_days));
        }
        if let Some(is_paid) = patch.is_paid {
            sets.push("is_paid = ?");
            values.push(SqlValue::Bool(is_paid));
        }
        if let Some(notes) = patch.notes.as_ref() {
            sets.push("notes = ?");
            values.push(SqlValue::Str(notes.clone()));
        }
        if let Some(payroll_period) = patch.payroll_period.as_ref() {
            sets.push("payroll_period = ?");
            values.push(SqlValue::Str(payroll_period.clone()));
        }

        if !sets.is_empty() {
            let sql = format!("UPDATE leave_requests SET {} WHERE id = ?", sets.join(", "));
            let mut query = sqlx::query(&sql);
            for value in &values {
                query = match value {
                    SqlValue::U64(v) => query.bind(*v),
                    SqlValue::Str(v) => query.bind(v.as_str()),
                    SqlValue::Date(v) => query.bind(*v),
                    SqlValue::Num(v) => query.bind(*v),
                    SqlValue::Bool(v) => query.bind(*v),
                };
            }
            let result = query.bind(id).execute(&self.pool).await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::RowNotFound);
            }
        }

        self.fetch_request(id).await?.ok_or(StoreError::RowNotFound)
    }

    async fn set_request_status(
        &self,
        id: u64,
        status: LeaveStatus,
    ) -> StoreResult<LeaveRequest> {
        let result = sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound);
        }
        self.fetch_request(id).await?.ok_or(StoreError::RowNotFound)
    }

    async fn delete_request(&self, id: u64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM leave_requests WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_requests(&self, filter: &LeaveRequestFilter) -> StoreResult<Vec<LeaveRequest>> {
        let mut where_sql = String::from(" WHERE 1=1");
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(status) = filter.status {
            where_sql.push_str(" AND status = ?");
            values.push(SqlValue::Str(status.to_string()));
        }
        if let Some(user_id) = filter.user_id {
            where_sql.push_str(" AND user_id = ?");
            values.push(SqlValue::U64(user_id));
        }
        if let Some(country) = filter.country.as_deref() {
            where_sql.push_str(" AND country = ?");
            values.push(SqlValue::Str(country.to_string()));
        }
        if let Some(leave_type) = filter.leave_type {
            where_sql.push_str(" AND leave_type = ?");
            values.push(SqlValue::Str(leave_type.to_string()));
        }
        if let Some(from) = filter.from {
            where_sql.push_str(" AND end_date >= ?");
            values.push(SqlValue::Date(from));
        }
        if let Some(to) = filter.to {
            where_sql.push_str(" AND start_date <= ?");
            values.push(SqlValue::Date(to));
        }
        if let Some(scope) = filter.scope_user_ids.as_ref() {
            // an empty scope means the caller may see nothing
            if scope.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; scope.len()].join(", ");
            where_sql.push_str(&format!(" AND user_id IN ({placeholders})"));
            for user_id in scope {
                values.push(SqlValue::U64(*user_id));
            }
        }

        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests{where_sql} \
             ORDER BY created_at DESC, id DESC"
        );
        let mut query = sqlx::query_as::<_, LeaveRequestRow>(&sql);
        for value in &values {
            query = match value {
                SqlValue::U64(v) => query.bind(*v),
                SqlValue::Str(v) => query.bind(v.as_str()),
                SqlValue::Date(v) => query.bind(*v),
                SqlValue::Num(v) => query.bind(*v),
                SqlValue::Bool(v) => query.bind(*v),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(LeaveRequest::try_from).collect()
    }

    async fn overlapping_requests(
        &self,
        user_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        exclude: Option<u64>,
    ) -> StoreResult<Vec<LeaveRequest>> {
        let mut sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM leave_requests \
             WHERE user_id = ? AND status IN ('submitted', 'approved') \
             AND start_date <= ? AND end_date >= ?"
        );
        if exclude.is_some() {
            sql.push_str(" AND id <> ?");
        }

        let mut query = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(user_id)
            .bind(end)
            .bind(start);
        if let Some(excluded_id) = exclude {
            query = query.bind(excluded_id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(LeaveRequest::try_from).collect()
    }

    async fn approvals_for(&self, leave_request_id: u64) -> StoreResult<Vec<LeaveApproval>> {
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} FROM leave_approvals \
             WHERE leave_request_id = ? ORDER BY decided_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, LeaveApprovalRow>(&sql)
            .bind(leave_request_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LeaveApproval::try_from).collect()
    }

    async fn balance_for(
        &self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> StoreResult<Option<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances \
             WHERE user_id = ? AND country = ? AND leave_type = ? AND year = ?"
        );
        let row = sqlx::query_as::<_, LeaveBalanceRow>(&sql)
            .bind(user_id)
            .bind(country)
            .bind(leave_type.to_string())
            .bind(year)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LeaveBalance::try_from).transpose()
    }

    async fn balances_for(
        &self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> StoreResult<Vec<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances \
             WHERE user_id = ? AND country = ? AND year = ? ORDER BY leave_type"
        );
        let rows = sqlx::query_as::<_, LeaveBalanceRow>(&sql)
            .bind(user_id)
            .bind(country)
            .bind(year)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LeaveBalance::try_from).collect()
    }

    async fn insert_balance_if_absent(
        &self,
        new: &NewLeaveBalance,
    ) -> StoreResult<Option<LeaveBalance>> {
        // unique (user, country, leave_type, year) key makes this race-safe
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO leave_balances
                (user_id, country, leave_type, year, total_days, used_days,
                 available_days, accrual_rate)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(new.user_id)
        .bind(&new.country)
        .bind(new.leave_type.to_string())
        .bind(new.year)
        .bind(new.total_days)
        .bind(new.total_days)
        .bind(new.accrual_rate)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.balance_for(new.user_id, &new.country, new.leave_type, new.year)
            .await
    }

    async fn balance_holders(&self, year: i32) -> StoreResult<Vec<(u64, String)>> {
        let mut stream = sqlx::query_as::<_, (u64, String)>(
            "SELECT DISTINCT user_id, country FROM leave_balances WHERE year = ? \
             ORDER BY user_id, country",
        )
        .bind(year)
        .fetch(&self.pool);

        let mut holders = Vec::new();
        while let Some(row) = stream.next().await {
            holders.push(row?);
        }
        Ok(holders)
    }
}

pub struct MySqlTxn {
    tx: Transaction<'static, MySql>,
}

impl MySqlTxn {
    async fn fetch_request_locked(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE");
        let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(LeaveRequest::try_from).transpose()
    }
}

#[async_trait]
impl LeaveTxn for MySqlTxn {
    async fn request_for_update(&mut self, id: u64) -> StoreResult<Option<LeaveRequest>> {
        self.fetch_request_locked(id).await
    }

    async fn set_request_status(
        &mut self,
        id: u64,
        status: LeaveStatus,
    ) -> StoreResult<LeaveRequest> {
        let result = sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound);
        }
        self.fetch_request_locked(id)
            .await?
            .ok_or(StoreError::RowNotFound)
    }

    async fn insert_approval(&mut self, new: NewLeaveApproval) -> StoreResult<LeaveApproval> {
        let result = sqlx::query(
            r#"
            INSERT INTO leave_approvals
                (leave_request_id, approver_id, status, comments, decided_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.leave_request_id)
        .bind(new.approver_id)
        .bind(new.status.to_string())
        .bind(&new.comments)
        .bind(new.decided_at)
        .execute(&mut *self.tx)
        .await?;

        let sql = format!("SELECT {APPROVAL_COLUMNS} FROM leave_approvals WHERE id = ?");
        let row = sqlx::query_as::<_, LeaveApprovalRow>(&sql)
            .bind(result.last_insert_id())
            .fetch_one(&mut *self.tx)
            .await?;
        LeaveApproval::try_from(row)
    }

    async fn balance_for_update(
        &mut self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> StoreResult<Option<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances \
             WHERE user_id = ? AND country = ? AND leave_type = ? AND year = ? FOR UPDATE"
        );
        let row = sqlx::query_as::<_, LeaveBalanceRow>(&sql)
            .bind(user_id)
            .bind(country)
            .bind(leave_type.to_string())
            .bind(year)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(LeaveBalance::try_from).transpose()
    }

    async fn balances_for_update(
        &mut self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> StoreResult<Vec<LeaveBalance>> {
        let sql = format!(
            "SELECT {BALANCE_COLUMNS} FROM leave_balances \
             WHERE user_id = ? AND country = ? AND year = ? ORDER BY leave_type FOR UPDATE"
        );
        let rows = sqlx::query_as::<_, LeaveBalanceRow>(&sql)
            .bind(user_id)
            .bind(country)
            .bind(year)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(LeaveBalance::try_from).collect()
    }

    async fn update_balance(&mut self, balance: &LeaveBalance) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE leave_balances
            SET total_days = ?, used_days = ?, available_days = ?, accrual_rate = ?
            WHERE id = ?
            "#,
        )
        .bind(balance.total_days)
        .bind(balance.used_days)
        .bind(balance.available_days)
        .bind(balance.accrual_rate)
        .bind(balance.id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound);
        }
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
