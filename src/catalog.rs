use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::model::LeaveType;

/// Default catalog shipped with the crate. Deployments override it with
/// `LeaveCatalog::from_path` (see `config::CoreConfig::catalog_path`).
static BUILTIN: Lazy<LeaveCatalog> = Lazy::new(|| {
    LeaveCatalog::from_json(include_str!("../config/leave_catalog.json"))
        .expect("built-in leave catalog is valid")
});

const DEFAULT_WORKING_DAYS: u32 = 22;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {path}")]
    NotFound { path: String },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-type allocation defaults and monthly accrual rate.
#[derive(Debug, Clone, Deserialize)]
pub struct TypePolicy {
    pub default_days: Decimal,
    pub monthly_accrual: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryPolicy {
    pub working_days_per_month: u32,
    pub leave_types: BTreeMap<LeaveType, TypePolicy>,
}

/// Versioned per-country leave taxonomy, loaded at startup.
///
/// The catalog owns which leave types a country accepts, their default
/// yearly allocations, accrual rates, and the working-days divisor used by
/// the payroll impact calculation.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveCatalog {
    version: String,
    default_working_days_per_month: u32,
    countries: BTreeMap<String, CountryPolicy>,
}

impl LeaveCatalog {
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|_| CatalogError::NotFound {
            path: path.display().to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// The catalog compiled into the crate.
    pub fn builtin() -> &'static LeaveCatalog {
        &BUILTIN
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Membership check used by request creation and the impact calculator.
    pub fn is_valid(&self, leave_type: LeaveType, country: &str) -> bool {
        self.countries
            .get(country)
            .is_some_and(|c| c.leave_types.contains_key(&leave_type))
    }

    pub fn types_for(&self, country: &str) -> Option<&BTreeMap<LeaveType, TypePolicy>> {
        self.countries.get(country).map(|c| &c.leave_types)
    }

    pub fn policy(&self, country: &str, leave_type: LeaveType) -> Option<&TypePolicy> {
        self.countries
            .get(country)
            .and_then(|c| c.leave_types.get(&leave_type))
    }

    /// Divisor for the daily-rate calculation; unknown countries fall back
    /// to the configured default.
    pub fn working_days_per_month(&self, country: &str) -> u32 {
        self.countries
            .get(country)
            .map(|c| c.working_days_per_month)
            .unwrap_or(self.default_working_days_per_month)
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.countries.keys().map(|c| c.as_str())
    }
}

impl Default for LeaveCatalog {
    fn default() -> Self {
        LeaveCatalog {
            version: "empty".to_string(),
            default_working_days_per_month: DEFAULT_WORKING_DAYS,
            countries: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = LeaveCatalog::builtin();
        assert_eq!(catalog.version(), "2025.1");
        let countries: Vec<_> = catalog.countries().collect();
        assert_eq!(countries, vec!["AU", "IN", "PH"]);
    }

    #[test]
    fn india_annual_leave_defaults() {
        let catalog = LeaveCatalog::builtin();
        let policy = catalog.policy("IN", LeaveType::AnnualLeaveIn).unwrap();
        assert_eq!(policy.default_days, dec!(21.00));
        assert_eq!(policy.monthly_accrual, dec!(1.75));
    }

    #[test]
    fn philippines_vacation_leave_defaults() {
        let catalog = LeaveCatalog::builtin();
        let policy = catalog.policy("PH", LeaveType::VacationLeavePh).unwrap();
        assert_eq!(policy.default_days, dec!(5.00));
        assert_eq!(policy.monthly_accrual, dec!(0.42));
    }

    #[test]
    fn australia_annual_leave_defaults() {
        let catalog = LeaveCatalog::builtin();
        let policy = catalog.policy("AU", LeaveType::AnnualLeaveAu).unwrap();
        assert_eq!(policy.default_days, dec!(20.00));
        assert_eq!(policy.monthly_accrual, dec!(1.67));
    }

    #[test]
    fn working_days_per_country() {
        let catalog = LeaveCatalog::builtin();
        assert_eq!(catalog.working_days_per_month("IN"), 26);
        assert_eq!(catalog.working_days_per_month("PH"), 26);
        assert_eq!(catalog.working_days_per_month("AU"), 22);
        // unknown country falls back to the default
        assert_eq!(catalog.working_days_per_month("DE"), 22);
    }

    #[test]
    fn type_membership_is_country_scoped() {
        let catalog = LeaveCatalog::builtin();
        assert!(catalog.is_valid(LeaveType::AnnualLeaveIn, "IN"));
        assert!(!catalog.is_valid(LeaveType::AnnualLeaveIn, "PH"));
        assert!(!catalog.is_valid(LeaveType::VacationLeavePh, "AU"));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = LeaveCatalog::from_path("/nonexistent/catalog.json").unwrap_err();
        match err {
            CatalogError::NotFound { path } => assert!(path.contains("catalog.json")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = LeaveCatalog::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CatalogError::Parse(_)));
    }
}
