//! Error types for the wallet consistency core.

use crate::domain::{AccountId, Currency};

/// Domain-level errors (business logic violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Insufficient funds in {currency}: available {available}, requested {requested}")]
    InsufficientFunds {
        currency: Currency,
        available: i64,
        requested: i64,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,
}

/// Caller-facing errors for the conversion engine.
///
/// Each variant tells the caller whether and how to retry: `Validation` and
/// `InsufficientFunds` are final, `ExchangeUnavailable` means the system is
/// degraded, `ConcurrencyConflict` means retry the whole operation from a
/// fresh quote.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds in {currency}: available {available}, requested {requested}")]
    InsufficientFunds {
        currency: Currency,
        available: i64,
        requested: i64,
    },

    #[error("Exchange unavailable: {0}")]
    ExchangeUnavailable(String),

    #[error("Concurrent modification detected; retry with a fresh quote")]
    ConcurrencyConflict,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for CoreError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::InsufficientFunds {
                currency,
                available,
                requested,
            }) => CoreError::InsufficientFunds {
                currency,
                available,
                requested,
            },
            RepoError::Domain(DomainError::ValidationError(msg)) => CoreError::Validation(msg),
            RepoError::Domain(DomainError::AccountNotFound(id)) => {
                CoreError::NotFound(format!("Account not found: {}", id))
            }
            RepoError::Domain(e) => CoreError::Validation(e.to_string()),
            RepoError::NotFound => CoreError::NotFound("Resource not found".into()),
            RepoError::Database(e) => CoreError::Internal(e),
            RepoError::Transaction(e) => CoreError::Internal(e),
        }
    }
}

impl From<DomainError> for CoreError {
    fn from(err: DomainError) -> Self {
        CoreError::from(RepoError::Domain(err))
    }
}

impl From<crate::ports::ExchangeError> for CoreError {
    fn from(err: crate::ports::ExchangeError) -> Self {
        use crate::ports::ExchangeError;
        match err {
            ExchangeError::UnsupportedCurrency(c) => {
                CoreError::Validation(format!("Unsupported currency: {}", c))
            }
            other => CoreError::ExchangeUnavailable(other.to_string()),
        }
    }
}
