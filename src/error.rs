use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::model::{LeaveStatus, LeaveType};
use crate::store::StoreError;

/// Error taxonomy for the leave core.
///
/// Single-item operations propagate these unmodified; `bulk_approve` folds
/// per-item failures into its result instead of aborting the batch.
#[derive(Debug, Error)]
pub enum LeaveError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("leave type {leave_type} is not valid for country {country}")]
    InvalidLeaveType {
        leave_type: LeaveType,
        country: String,
    },

    #[error("leave request {id} not found")]
    NotFound { id: u64 },

    /// Date-range conflict with an existing submitted or approved request.
    #[error("leave dates {start} to {end} overlap an existing request")]
    Overlap { start: NaiveDate, end: NaiveDate },

    /// Requested days exceed the available balance. Raised as an advisory
    /// check at creation time and as the authoritative check at approval.
    #[error(
        "insufficient {leave_type} balance: requested {requested}, available {available}"
    )]
    InsufficientBalance {
        leave_type: LeaveType,
        requested: Decimal,
        available: Decimal,
    },

    #[error("request is {actual}, expected {expected}")]
    InvalidState {
        expected: LeaveStatus,
        actual: LeaveStatus,
    },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Any persistence failure. Transactional writes are rolled back in
    /// full before this surfaces.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeaveError {
    pub fn validation(message: impl Into<String>) -> Self {
        LeaveError::Validation {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LeaveError::Forbidden {
            message: message.into(),
        }
    }
}

pub type LeaveResult<T> = Result<T, LeaveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_id() {
        let err = LeaveError::NotFound { id: 42 };
        assert_eq!(err.to_string(), "leave request 42 not found");
    }

    #[test]
    fn invalid_state_displays_both_statuses() {
        let err = LeaveError::InvalidState {
            expected: LeaveStatus::Submitted,
            actual: LeaveStatus::Draft,
        };
        assert_eq!(err.to_string(), "request is draft, expected submitted");
    }

    #[test]
    fn errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<LeaveError>();
    }
}
