//! Ledger-specific error types.
//!
//! Granular errors for ledger operations, converted into [`PointeError`]
//! at the HTTP boundary.

use std::fmt;

use crate::error::PointeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A kind-specific required field failed validation at construction.
    InvalidField { field: String, reason: String },

    /// The user already consumed their one trial lesson.
    TrialAlreadyUsed { user_id: String },

    /// The referenced user does not exist in the directory.
    UserNotFound { user_id: String },

    /// The referenced transaction does not exist.
    TransactionNotFound { id: String },

    /// The operation targets a transaction of the wrong kind.
    WrongKind { id: String, expected: &'static str },

    /// The punch card has no entries left.
    EntriesExhausted { id: String },

    /// The subscription has used its full monthly allowance.
    MonthlyLimitReached { id: String },

    /// Restoring an entry would exceed the immutable total.
    BalanceOverflow { id: String },

    /// The user directory could not record the trial flag and the
    /// transaction write was rolled back.
    TrialFlagFailed { user_id: String },
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidField { field, reason } => {
                write!(f, "invalid {field}: {reason}")
            }
            Self::TrialAlreadyUsed { user_id } => {
                write!(f, "user '{user_id}' has already used their trial lesson")
            }
            Self::UserNotFound { user_id } => {
                write!(f, "user '{user_id}' not found")
            }
            Self::TransactionNotFound { id } => {
                write!(f, "transaction '{id}' not found")
            }
            Self::WrongKind { id, expected } => {
                write!(f, "transaction '{id}' is not a {expected}")
            }
            Self::EntriesExhausted { id } => {
                write!(f, "punch card '{id}' has no entries remaining")
            }
            Self::MonthlyLimitReached { id } => {
                write!(f, "subscription '{id}' has used its monthly entries")
            }
            Self::BalanceOverflow { id } => {
                write!(f, "restoring an entry on '{id}' would exceed its total")
            }
            Self::TrialFlagFailed { user_id } => {
                write!(f, "failed to record trial usage for user '{user_id}'")
            }
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<LedgerError> for PointeError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::TransactionNotFound { .. } => PointeError::NotFound(err.to_string()),

            LedgerError::TrialAlreadyUsed { .. }
            | LedgerError::EntriesExhausted { .. }
            | LedgerError::MonthlyLimitReached { .. }
            | LedgerError::BalanceOverflow { .. } => PointeError::Conflict(err.to_string()),

            LedgerError::InvalidField { .. }
            | LedgerError::UserNotFound { .. }
            | LedgerError::WrongKind { .. } => PointeError::Validation(err.to_string()),

            LedgerError::TrialFlagFailed { .. } => PointeError::Internal(err.to_string()),
        }
    }
}
