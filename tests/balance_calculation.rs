//! Balance initialization, accrual, cached reads and payroll impact.

use std::sync::Arc;

use rust_decimal_macros::dec;

use leaveflow::audit::RecordingAuditLog;
use leaveflow::cache::MokaBalanceCache;
use leaveflow::catalog::LeaveCatalog;
use leaveflow::error::LeaveError;
use leaveflow::model::{current_leave_year, Actor, LeaveType, NewLeaveBalance};
use leaveflow::service::BalanceService;
use leaveflow::store::{LeaveStore, MemoryLeaveStore};

type Balances = BalanceService<MemoryLeaveStore, MokaBalanceCache, RecordingAuditLog>;

fn service() -> (Arc<MemoryLeaveStore>, Arc<Balances>) {
    let store = Arc::new(MemoryLeaveStore::new());
    let cache = Arc::new(MokaBalanceCache::default());
    let audit = Arc::new(RecordingAuditLog::default());
    let catalog = Arc::new(LeaveCatalog::builtin().clone());
    let balances = Arc::new(BalanceService::new(store.clone(), cache, audit, catalog));
    (store, balances)
}

fn system() -> Actor {
    Actor::new(1, "system")
}

#[tokio::test]
async fn initialization_is_idempotent() {
    let (_store, balances) = service();
    let year = current_leave_year();

    let created = balances
        .initialize_balances(&system(), 10, "IN", year)
        .await
        .unwrap();
    assert_eq!(created.len(), 6);

    let annual = created
        .iter()
        .find(|b| b.leave_type == LeaveType::AnnualLeaveIn)
        .unwrap();
    assert_eq!(annual.total_days, dec!(21.00));
    assert_eq!(annual.used_days, dec!(0));
    assert_eq!(annual.available_days, dec!(21.00));
    assert_eq!(annual.accrual_rate, dec!(1.75));

    // second run creates nothing and changes nothing
    let again = balances
        .initialize_balances(&system(), 10, "IN", year)
        .await
        .unwrap();
    assert!(again.is_empty());

    let rows = balances.balances(10, "IN", year).await.unwrap();
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|b| b.invariant_holds()));
}

#[tokio::test]
async fn initialization_rejects_unknown_country() {
    let (_store, balances) = service();
    let err = balances
        .initialize_balances(&system(), 10, "DE", 2025)
        .await
        .unwrap_err();
    assert!(matches!(err, LeaveError::Validation { .. }));
}

#[tokio::test]
async fn accrual_raises_totals_and_keeps_invariant() {
    let (store, balances) = service();
    let year = current_leave_year();
    balances
        .initialize_balances(&system(), 10, "IN", year)
        .await
        .unwrap();

    let accrued = balances.accrue(&system(), 10, "IN", year).await.unwrap();
    // maternity/paternity/unpaid carry a zero rate and are skipped
    assert_eq!(accrued.len(), 3);

    let annual = store
        .balance_for(10, "IN", LeaveType::AnnualLeaveIn, year)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(annual.total_days, dec!(22.75));
    assert_eq!(annual.available_days, dec!(22.75));
    assert!(annual.invariant_holds());

    let maternity = store
        .balance_for(10, "IN", LeaveType::MaternityLeaveIn, year)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(maternity.total_days, dec!(182.00));
}

#[tokio::test]
async fn summary_reflects_accrual_through_invalidation() {
    let (_store, balances) = service();
    let year = current_leave_year();
    balances
        .initialize_balances(&system(), 10, "PH", year)
        .await
        .unwrap();

    let before = balances.summary(10, "PH", year).await.unwrap();
    // 5 + 5 + 105 + 7 + 0
    assert_eq!(before.total_days, dec!(122.00));
    assert_eq!(before.leave_types, 5);

    // accrual commits, then invalidates; the next summary is fresh
    balances.accrue(&system(), 10, "PH", year).await.unwrap();
    let after = balances.summary(10, "PH", year).await.unwrap();
    assert_eq!(after.total_days, dec!(122.84));
    assert_eq!(after.available_days, dec!(122.84));
}

#[tokio::test]
async fn cached_list_is_stale_until_invalidated() {
    let (store, balances) = service();
    let year = current_leave_year();
    balances
        .initialize_balances(&system(), 10, "AU", year)
        .await
        .unwrap();

    // prime the cache
    let primed = balances.balances(10, "AU", year).await.unwrap();
    assert_eq!(primed.len(), 4);

    // a write that bypasses the service is invisible until invalidation
    store
        .insert_balance_if_absent(&NewLeaveBalance {
            user_id: 10,
            country: "AU".into(),
            leave_type: LeaveType::LongServiceLeaveAu,
            year,
            total_days: dec!(5),
            accrual_rate: dec!(0),
        })
        .await
        .unwrap();
    let cached = balances.balances(10, "AU", year).await.unwrap();
    assert_eq!(cached.len(), 4, "cached list must not see the direct write");

    balances.invalidate(10, "AU", year).await;
    let fresh = balances.balances(10, "AU", year).await.unwrap();
    assert_eq!(fresh.len(), 5);
}

#[tokio::test]
async fn accrue_without_rows_is_a_no_op() {
    let (_store, balances) = service();
    let accrued = balances.accrue(&system(), 77, "AU", 2025).await.unwrap();
    assert!(accrued.is_empty());
}

#[tokio::test]
async fn leave_impact_matches_country_divisors() {
    let (_store, balances) = service();

    // 2600 / 26 = 100 per day; two unpaid days deduct 200
    let unpaid = balances
        .leave_impact(
            LeaveType::VacationLeavePh,
            dec!(2),
            false,
            dec!(2600),
            "PH",
        )
        .unwrap();
    assert_eq!(unpaid.paid_amount, dec!(0));
    assert_eq!(unpaid.deduction_amount, dec!(200));

    let paid = balances
        .leave_impact(LeaveType::AnnualLeaveAu, dec!(2), true, dec!(2200), "AU")
        .unwrap();
    assert_eq!(paid.daily_rate, dec!(100));
    assert_eq!(paid.paid_amount, dec!(200));
    assert_eq!(paid.deduction_amount, dec!(0));
}
