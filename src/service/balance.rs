//! Balance ledger reads, idempotent initialization, monthly accrual and the
//! cached balance views.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;

use super::emit_audit;
use crate::audit::{AuditEvent, AuditLog};
use crate::cache::{self, BalanceCache, BalanceCacheKey, CachedEntry};
use crate::catalog::LeaveCatalog;
use crate::error::{LeaveError, LeaveResult};
use crate::model::{Actor, BalanceSummary, LeaveBalance, LeaveType, NewLeaveBalance};
use crate::payroll::{self, LeaveImpact};
use crate::store::{LeaveStore, LeaveTxn};

/// Owns the leave taxonomy, the default allocations, the payroll impact
/// arithmetic and the balance read cache. The approval workflow is the only
/// component that debits the ledger; it calls back into [`invalidate`]
/// after its transaction commits.
///
/// [`invalidate`]: BalanceService::invalidate
pub struct BalanceService<S, C, A> {
    store: Arc<S>,
    cache: Arc<C>,
    audit: Arc<A>,
    catalog: Arc<LeaveCatalog>,
}

impl<S, C, A> BalanceService<S, C, A>
where
    S: LeaveStore,
    C: BalanceCache,
    A: AuditLog,
{
    pub fn new(store: Arc<S>, cache: Arc<C>, audit: Arc<A>, catalog: Arc<LeaveCatalog>) -> Self {
        BalanceService {
            store,
            cache,
            audit,
            catalog,
        }
    }

    pub fn catalog(&self) -> &LeaveCatalog {
        &self.catalog
    }

    pub fn is_valid_leave_type(&self, leave_type: LeaveType, country: &str) -> bool {
        self.catalog.is_valid(leave_type, country)
    }

    /// Create the default balance rows for every leave type of `country`.
    /// Idempotent: existing rows are never touched; only newly created rows
    /// are returned.
    pub async fn initialize_balances(
        &self,
        actor: &Actor,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> LeaveResult<Vec<LeaveBalance>> {
        let types = self
            .catalog
            .types_for(country)
            .ok_or_else(|| LeaveError::validation(format!("unknown country {country}")))?;

        let mut created = Vec::new();
        for (leave_type, policy) in types {
            let new = NewLeaveBalance {
                user_id,
                country: country.to_string(),
                leave_type: *leave_type,
                year,
                total_days: policy.default_days,
                accrual_rate: policy.monthly_accrual,
            };
            if let Some(row) = self.store.insert_balance_if_absent(&new).await? {
                created.push(row);
            }
        }

        if !created.is_empty() {
            self.invalidate(user_id, country, year).await;
            emit_audit(
                self.audit.as_ref(),
                AuditEvent::new(
                    "leave_balance.initialized",
                    "leave_balance",
                    user_id,
                    actor.user_id,
                    &actor.role,
                    json!({
                        "country": country,
                        "year": year,
                        "created": created.len(),
                    }),
                ),
            )
            .await;
        }
        Ok(created)
    }

    /// Apply one monthly accrual cycle to every balance row of the scope
    /// with a positive rate. Invoked by an external scheduler.
    pub async fn accrue(
        &self,
        actor: &Actor,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> LeaveResult<Vec<LeaveBalance>> {
        let mut txn = self.store.begin().await?;
        let rows = txn.balances_for_update(user_id, country, year).await?;

        let mut accrued = Vec::new();
        for mut balance in rows {
            if balance.accrual_rate <= Decimal::ZERO {
                continue;
            }
            balance.accrue();
            txn.update_balance(&balance).await?;
            accrued.push(balance);
        }

        if accrued.is_empty() {
            txn.rollback().await?;
            return Ok(accrued);
        }
        txn.commit().await?;

        // invalidation strictly after commit
        self.invalidate(user_id, country, year).await;
        emit_audit(
            self.audit.as_ref(),
            AuditEvent::new(
                "leave_balance.accrued",
                "leave_balance",
                user_id,
                actor.user_id,
                &actor.role,
                json!({
                    "country": country,
                    "year": year,
                    "accrued": accrued.len(),
                }),
            ),
        )
        .await;
        Ok(accrued)
    }

    /// Balance rows for a scope, served from the cache when fresh.
    pub async fn balances(
        &self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> LeaveResult<Vec<LeaveBalance>> {
        let key = BalanceCacheKey::balances(user_id, country, year);
        if let Some(CachedEntry::Balances(rows)) = self.cache.get(&key).await {
            return Ok(rows);
        }

        let rows = self.store.balances_for(user_id, country, year).await?;
        self.cache
            .set(key, CachedEntry::Balances(rows.clone()))
            .await;
        Ok(rows)
    }

    /// Cross-type totals for a scope, cached separately from the row list.
    pub async fn summary(
        &self,
        user_id: u64,
        country: &str,
        year: i32,
    ) -> LeaveResult<BalanceSummary> {
        let key = BalanceCacheKey::summary(user_id, country, year);
        if let Some(CachedEntry::Summary(summary)) = self.cache.get(&key).await {
            return Ok(summary);
        }

        let rows = self.store.balances_for(user_id, country, year).await?;
        let summary = BalanceSummary::from_rows(user_id, country, year, &rows);
        self.cache
            .set(key, CachedEntry::Summary(summary.clone()))
            .await;
        Ok(summary)
    }

    /// Uncached single-row read. Mutation decisions must not trust the
    /// cache, so the creation-time advisory check comes through here.
    pub async fn available(
        &self,
        user_id: u64,
        country: &str,
        leave_type: LeaveType,
        year: i32,
    ) -> LeaveResult<Option<LeaveBalance>> {
        Ok(self
            .store
            .balance_for(user_id, country, leave_type, year)
            .await?)
    }

    /// Drop the cached views of one scope. Callers invoke this only after
    /// their mutating transaction has committed.
    pub async fn invalidate(&self, user_id: u64, country: &str, year: i32) {
        cache::invalidate_scope(self.cache.as_ref(), user_id, country, year).await;
    }

    /// Stateless payroll-impact figure for the external payroll consumer.
    pub fn leave_impact(
        &self,
        leave_type: LeaveType,
        total_days: Decimal,
        is_paid: bool,
        base_salary: Decimal,
        country: &str,
    ) -> LeaveResult<LeaveImpact> {
        payroll::calculate_leave_impact(
            &self.catalog,
            leave_type,
            total_days,
            is_paid,
            base_salary,
            country,
        )
    }
}
