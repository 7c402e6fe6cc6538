//! Transactional outbox relay.
//!
//! Polls the outbox for unpublished records, publishes them to the
//! transport keyed by aggregate id, and flips each record to published
//! only after the transport accepted it. Crashing between publish and
//! flip republishes the record on the next tick, so delivery is
//! at-least-once and downstream consumers deduplicate.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, warn};

use wallet_types::{BrokerError, EventPublisher, OutboxStore, RepoError};

use crate::security::SignedEnvelope;

/// Error type for relay ticks.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base interval between polls.
    pub poll_interval: Duration,
    /// Upper bound on the backoff applied after failed ticks.
    pub max_backoff: Duration,
    /// Records fetched per tick.
    pub batch_size: i64,
    /// Secret used to sign transport envelopes.
    pub signing_secret: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            batch_size: 100,
            signing_secret: "dev-signing-secret".to_string(),
        }
    }
}

/// Polling publisher for the transactional outbox.
pub struct OutboxRelay<O: OutboxStore, P: EventPublisher> {
    outbox: O,
    publisher: P,
    config: RelayConfig,
}

impl<O: OutboxStore, P: EventPublisher> OutboxRelay<O, P> {
    pub fn new(outbox: O, publisher: P, config: RelayConfig) -> Self {
        Self {
            outbox,
            publisher,
            config,
        }
    }

    /// One relay tick: publish a batch of unpublished records in creation
    /// order. Returns how many records this tick published.
    ///
    /// A transport failure aborts the tick with the remaining records
    /// untouched; they stay unpublished and are retried next tick.
    pub async fn run_once(&self) -> Result<usize, RelayError> {
        let batch = self.outbox.fetch_unpublished(self.config.batch_size).await?;
        let mut published = 0;

        for record in batch {
            let envelope =
                SignedEnvelope::seal(record.payload.clone(), &self.config.signing_secret);
            let bytes = serde_json::to_vec(&envelope)
                .map_err(|e| RepoError::Database(e.to_string()))?;

            self.publisher
                .publish(&record.topic(), &record.aggregate_id, &bytes)
                .await?;

            // Flip only after the transport accepted the message. Losing the
            // flip race to another relay instance just means a duplicate
            // publish, which consumers already tolerate.
            if self.outbox.mark_published(record.id).await? {
                published += 1;
            } else {
                debug!(record_id = %record.id, "record already flipped by another relay");
            }
        }

        if published > 0 {
            debug!(published, "relay tick published records");
        }
        Ok(published)
    }

    /// Runs the relay until the task is aborted or dropped.
    ///
    /// Failed ticks back off exponentially with jitter up to `max_backoff`,
    /// then the interval resets on the first successful tick.
    pub async fn run(self) {
        info!(
            poll_ms = self.config.poll_interval.as_millis() as u64,
            batch = self.config.batch_size,
            "outbox relay started"
        );

        let mut delay = self.config.poll_interval;
        loop {
            tokio::time::sleep(delay).await;

            match self.run_once().await {
                Ok(_) => {
                    delay = self.config.poll_interval;
                }
                Err(e) => {
                    let doubled = delay.saturating_mul(2).min(self.config.max_backoff);
                    let jitter_ms = rand::rng().random_range(0..=doubled.as_millis() as u64 / 4);
                    delay = doubled + Duration::from_millis(jitter_ms);
                    warn!(error = %e, retry_ms = delay.as_millis() as u64, "relay tick failed");
                }
            }
        }
    }
}
