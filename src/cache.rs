use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;

use crate::model::{BalanceSummary, LeaveBalance};
use crate::store::LeaveStore;

/// Balance reads are cached for five minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CAPACITY: u64 = 100_000;

/// Two shapes are cached per (user, country, year) scope: the raw balance
/// list and the derived cross-type summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BalanceCacheKey {
    Balances {
        user_id: u64,
        country: String,
        year: i32,
    },
    Summary {
        user_id: u64,
        country: String,
        year: i32,
    },
}

impl BalanceCacheKey {
    pub fn balances(user_id: u64, country: &str, year: i32) -> Self {
        BalanceCacheKey::Balances {
            user_id,
            country: country.to_string(),
            year,
        }
    }

    pub fn summary(user_id: u64, country: &str, year: i32) -> Self {
        BalanceCacheKey::Summary {
            user_id,
            country: country.to_string(),
            year,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedEntry {
    Balances(Vec<LeaveBalance>),
    Summary(BalanceSummary),
}

/// Process-local, best-effort balance cache. Never a source of truth:
/// authoritative checks always read the store inside the transaction. Cache
/// operations never surface errors; a miss falls through to persistence.
#[async_trait]
pub trait BalanceCache: Send + Sync + 'static {
    async fn get(&self, key: &BalanceCacheKey) -> Option<CachedEntry>;
    async fn set(&self, key: BalanceCacheKey, entry: CachedEntry);
    async fn invalidate(&self, key: &BalanceCacheKey);
}

/// Moka-backed implementation. Expired entries are dropped on read and
/// swept amortized by moka's internal maintenance on writes; there is no
/// background timer. Construct once at startup and inject by reference.
pub struct MokaBalanceCache {
    inner: Cache<BalanceCacheKey, CachedEntry>,
}

impl MokaBalanceCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        MokaBalanceCache {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }
}

impl Default for MokaBalanceCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl BalanceCache for MokaBalanceCache {
    async fn get(&self, key: &BalanceCacheKey) -> Option<CachedEntry> {
        self.inner.get(key).await
    }

    async fn set(&self, key: BalanceCacheKey, entry: CachedEntry) {
        self.inner.insert(key, entry).await;
    }

    async fn invalidate(&self, key: &BalanceCacheKey) {
        self.inner.invalidate(key).await;
    }
}

/// Drop both cached shapes for one (user, country, year) scope. Called
/// strictly after the mutating transaction has committed.
pub async fn invalidate_scope<C: BalanceCache + ?Sized>(
    cache: &C,
    user_id: u64,
    country: &str,
    year: i32,
) {
    let balances_key = BalanceCacheKey::balances(user_id, country, year);
    let summary_key = BalanceCacheKey::summary(user_id, country, year);
    futures::future::join_all(vec![
        cache.invalidate(&balances_key),
        cache.invalidate(&summary_key),
    ])
    .await;
}

/// Prime the balance cache for recently active users in batches. Intended
/// for service startup, alongside whatever warms the rest of the process.
pub async fn warmup_balance_cache<S, C>(
    store: &S,
    cache: &C,
    users: &[(u64, String)],
    year: i32,
    batch_size: usize,
) -> Result<usize>
where
    S: LeaveStore,
    C: BalanceCache,
{
    let mut primed = 0usize;
    for chunk in users.chunks(batch_size.max(1)) {
        let mut inserts = Vec::with_capacity(chunk.len());
        for (user_id, country) in chunk {
            let rows = store.balances_for(*user_id, country, year).await?;
            if rows.is_empty() {
                continue;
            }
            let summary = BalanceSummary::from_rows(*user_id, country, year, &rows);
            inserts.push(cache.set(
                BalanceCacheKey::balances(*user_id, country, year),
                CachedEntry::Balances(rows),
            ));
            inserts.push(cache.set(
                BalanceCacheKey::summary(*user_id, country, year),
                CachedEntry::Summary(summary),
            ));
            primed += 1;
        }
        // Await the batch concurrently
        futures::future::join_all(inserts).await;
    }

    log::info!(
        "Balance cache warmup complete: {} scopes primed for year {}",
        primed,
        year
    );

    Ok(primed)
}
