use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use crate::cache;

/// Runtime knobs for the leave core, read once at service startup.
#[derive(Clone)]
pub struct CoreConfig {
    pub database_url: Option<String>,
    /// TTL of the balance/summary cache.
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// Override for the built-in leave catalog.
    pub catalog_path: Option<String>,
}

impl CoreConfig {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").ok(),
            cache_ttl_secs: env::var("BALANCE_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(cache::DEFAULT_TTL.as_secs()),
            cache_capacity: env::var("BALANCE_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(cache::DEFAULT_CAPACITY),
            catalog_path: env::var("LEAVE_CATALOG_PATH").ok(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_ttl_converts_seconds() {
        let config = CoreConfig {
            database_url: None,
            cache_ttl_secs: cache::DEFAULT_TTL.as_secs(),
            cache_capacity: cache::DEFAULT_CAPACITY,
            catalog_path: None,
        };
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }
}
