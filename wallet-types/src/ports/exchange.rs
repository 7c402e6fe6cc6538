//! External exchange port.
//!
//! The conversion engine quotes and executes against this interface.
//! Implementations can be HTTP clients, in-memory simulators, etc.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Currency;

/// Error type for exchange operations.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Exchange unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown quote: {0}")]
    UnknownQuote(Uuid),

    #[error("Quote expired: {0}")]
    QuoteExpired(Uuid),
}

/// A priced conversion offer, valid until `expires_at`.
///
/// `net_amount` is the destination-currency credit with the fee already
/// deducted; `fee` is quoted in destination minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: Uuid,
    pub rate: f64,
    pub fee: i64,
    pub net_amount: i64,
    pub expires_at: DateTime<Utc>,
    pub available: bool,
}

impl Quote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Result of executing a quote. Execution is the irreversible external leg;
/// a transport timeout must be treated as failure, never assumed success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub success: bool,
    pub transaction_id: String,
    pub message: String,
}

/// Port trait for the external exchange collaborator.
#[async_trait::async_trait]
pub trait ExchangeApi: Send + Sync + 'static {
    /// Prices a conversion of `amount` minor units of `from` into `to`.
    async fn quote(
        &self,
        from: Currency,
        to: Currency,
        amount: i64,
    ) -> Result<Quote, ExchangeError>;

    /// Executes a previously-obtained quote. Must not be called with an
    /// expired quote id; callers re-quote instead.
    async fn execute(&self, quote_id: Uuid) -> Result<Execution, ExchangeError>;
}

// Allows picking the adapter at runtime.
#[async_trait::async_trait]
impl ExchangeApi for Box<dyn ExchangeApi> {
    async fn quote(
        &self,
        from: Currency,
        to: Currency,
        amount: i64,
    ) -> Result<Quote, ExchangeError> {
        (**self).quote(from, to, amount).await
    }

    async fn execute(&self, quote_id: Uuid) -> Result<Execution, ExchangeError> {
        (**self).execute(quote_id).await
    }
}
