//! Exchange adapters: an in-memory simulator and an HTTP client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use wallet_types::{Currency, ExchangeApi, ExchangeError, Execution, Quote};

// ─────────────────────────────────────────────────────────────────────────────
// Simulated exchange
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory exchange backed by the indicative rate table.
///
/// Quotes live in a concurrent registry until executed or expired.
/// Availability and forced-failure toggles let tests exercise every
/// degraded path of the conversion engine.
pub struct SimExchange {
    quotes: DashMap<Uuid, Quote>,
    quote_ttl: chrono::Duration,
    fee_bps: i64,
    available: AtomicBool,
    fail_next_execute: AtomicBool,
}

impl SimExchange {
    /// Creates a simulator with the given quote time-to-live and fee in
    /// basis points of the converted amount.
    pub fn new(quote_ttl: Duration, fee_bps: i64) -> Self {
        Self {
            quotes: DashMap::new(),
            quote_ttl: chrono::Duration::from_std(quote_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
            fee_bps,
            available: AtomicBool::new(true),
            fail_next_execute: AtomicBool::new(false),
        }
    }

    /// Toggles availability. While down, quote and execute both fail.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes the next execute call come back unsuccessful.
    pub fn fail_next_execute(&self) {
        self.fail_next_execute.store(true, Ordering::SeqCst);
    }
}

impl Default for SimExchange {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), 50)
    }
}

#[async_trait]
impl ExchangeApi for SimExchange {
    async fn quote(
        &self,
        from: Currency,
        to: Currency,
        amount: i64,
    ) -> Result<Quote, ExchangeError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ExchangeError::Unavailable("exchange offline".to_string()));
        }

        let rate = fx_rates::get_rate(from, to);
        let gross = fx_rates::convert_minor(amount, from, to);
        let fee = gross * self.fee_bps / 10_000;

        let quote = Quote {
            quote_id: Uuid::new_v4(),
            rate,
            fee,
            net_amount: gross - fee,
            expires_at: Utc::now() + self.quote_ttl,
            available: true,
        };

        debug!(quote_id = %quote.quote_id, %from, %to, amount, net = quote.net_amount, "quote issued");
        self.quotes.insert(quote.quote_id, quote.clone());
        Ok(quote)
    }

    async fn execute(&self, quote_id: Uuid) -> Result<Execution, ExchangeError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ExchangeError::Unavailable("exchange offline".to_string()));
        }

        let quote = self
            .quotes
            .get(&quote_id)
            .map(|q| q.clone())
            .ok_or(ExchangeError::UnknownQuote(quote_id))?;

        if quote.is_expired(Utc::now()) {
            self.quotes.remove(&quote_id);
            return Err(ExchangeError::QuoteExpired(quote_id));
        }

        if self.fail_next_execute.swap(false, Ordering::SeqCst) {
            return Ok(Execution {
                success: false,
                transaction_id: format!("sim-{}", Uuid::new_v4()),
                message: "execution rejected".to_string(),
            });
        }

        // Executed quotes are consumed; a second execute is an unknown quote.
        self.quotes.remove(&quote_id);
        Ok(Execution {
            success: true,
            transaction_id: format!("sim-{}", Uuid::new_v4()),
            message: "executed".to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP exchange
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for a real exchange service.
///
/// A transport timeout on execute is reported as unavailable, never as
/// success; the engine rolls the conversion back in that case.
pub struct HttpExchange {
    client: reqwest::Client,
    base_url: String,
}

#[derive(serde::Serialize)]
struct QuoteBody {
    from: Currency,
    to: Currency,
    amount: i64,
}

impl HttpExchange {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExchangeError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ExchangeApi for HttpExchange {
    async fn quote(
        &self,
        from: Currency,
        to: Currency,
        amount: i64,
    ) -> Result<Quote, ExchangeError> {
        let url = format!("{}/quotes", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&QuoteBody { from, to, amount })
            .send()
            .await
            .map_err(|e| ExchangeError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ExchangeError::UnsupportedCurrency(format!("{}->{}", from, to)));
        }
        if !response.status().is_success() {
            return Err(ExchangeError::Unavailable(format!(
                "quote returned {}",
                response.status()
            )));
        }

        response
            .json::<Quote>()
            .await
            .map_err(|e| ExchangeError::Unavailable(e.to_string()))
    }

    async fn execute(&self, quote_id: Uuid) -> Result<Execution, ExchangeError> {
        let url = format!("{}/quotes/{}/execute", self.base_url, quote_id);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| ExchangeError::Unavailable(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(ExchangeError::UnknownQuote(quote_id)),
            reqwest::StatusCode::GONE => Err(ExchangeError::QuoteExpired(quote_id)),
            status if status.is_success() => response
                .json::<Execution>()
                .await
                .map_err(|e| ExchangeError::Unavailable(e.to_string())),
            status => Err(ExchangeError::Unavailable(format!(
                "execute returned {}",
                status
            ))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wallet_types::Currency;

    #[tokio::test]
    async fn test_quote_prices_with_fee() {
        fx_rates::disable_fluctuation();
        let exchange = SimExchange::new(Duration::from_secs(30), 50);

        let quote = exchange
            .quote(Currency::USD, Currency::NGN, 10_000)
            .await
            .unwrap();

        let gross = fx_rates::convert_minor(10_000, Currency::USD, Currency::NGN);
        assert_eq!(quote.fee, gross * 50 / 10_000);
        assert_eq!(quote.net_amount, gross - quote.fee);
        assert!(quote.net_amount < gross);
    }

    #[tokio::test]
    async fn test_execute_consumes_quote() {
        let exchange = SimExchange::default();
        let quote = exchange
            .quote(Currency::USD, Currency::EUR, 5_000)
            .await
            .unwrap();

        let execution = exchange.execute(quote.quote_id).await.unwrap();
        assert!(execution.success);

        assert!(matches!(
            exchange.execute(quote.quote_id).await,
            Err(ExchangeError::UnknownQuote(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_quote_rejected() {
        let exchange = SimExchange::new(Duration::ZERO, 0);
        let quote = exchange
            .quote(Currency::USD, Currency::EUR, 5_000)
            .await
            .unwrap();

        assert!(matches!(
            exchange.execute(quote.quote_id).await,
            Err(ExchangeError::QuoteExpired(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_exchange() {
        let exchange = SimExchange::default();
        exchange.set_available(false);

        assert!(matches!(
            exchange.quote(Currency::USD, Currency::EUR, 100).await,
            Err(ExchangeError::Unavailable(_))
        ));

        exchange.set_available(true);
        assert!(exchange.quote(Currency::USD, Currency::EUR, 100).await.is_ok());
    }

    #[tokio::test]
    async fn test_forced_execute_failure() {
        let exchange = SimExchange::default();
        let quote = exchange
            .quote(Currency::USD, Currency::GBP, 1_000)
            .await
            .unwrap();

        exchange.fail_next_execute();
        let execution = exchange.execute(quote.quote_id).await.unwrap();
        assert!(!execution.success);

        // The failed execute did not consume the quote.
        let execution = exchange.execute(quote.quote_id).await.unwrap();
        assert!(execution.success);
    }
}
