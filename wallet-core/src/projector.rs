//! Idempotent ledger projector.
//!
//! Consumes balance events from the transport and appends one immutable
//! ledger entry per logical event. The unique idempotency key on the
//! ledger table is the deduplication mechanism: redelivered or
//! republished events insert as duplicates and are acknowledged without
//! a second entry. Acknowledgment always happens after the insert, never
//! before, so a crash between the two redelivers instead of losing.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use wallet_types::{
    AppendOutcome, BalanceEvent, BrokerError, Delivery, EventConsumer, LedgerEntry, LedgerStore,
    RepoError,
};

use crate::security::SignedEnvelope;

/// Error type for projector ticks.
#[derive(Debug, thiserror::Error)]
pub enum ProjectorError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// A new ledger entry was written.
    Applied,
    /// The event was applied before; acknowledged without a new entry.
    Duplicate,
    /// The payload was malformed or unrecognized; logged and acknowledged
    /// so it cannot wedge the partition.
    Skipped,
}

/// Projects balance events into the append-only ledger.
pub struct LedgerProjector<L: LedgerStore, C: EventConsumer> {
    ledger: L,
    consumer: C,
    signing_secret: String,
    poll_interval: Duration,
}

impl<L: LedgerStore, C: EventConsumer> LedgerProjector<L, C> {
    pub fn new(ledger: L, consumer: C, signing_secret: &str, poll_interval: Duration) -> Self {
        Self {
            ledger,
            consumer,
            signing_secret: signing_secret.to_string(),
            poll_interval,
        }
    }

    /// Polls for one delivery and applies it. Returns `None` when caught up.
    ///
    /// A store failure returns the error without acknowledging, so the
    /// delivery comes back on the next poll.
    pub async fn run_once(&mut self) -> Result<Option<Projection>, ProjectorError> {
        let Some(delivery) = self.consumer.poll().await? else {
            return Ok(None);
        };

        let outcome = match self.decode(&delivery) {
            Some(event) => self.apply(&event).await?,
            None => Projection::Skipped,
        };

        self.consumer.ack(&delivery.position).await?;
        Ok(Some(outcome))
    }

    /// Runs the projector until the task is aborted or dropped.
    pub async fn run(mut self) {
        info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            "ledger projector started"
        );

        loop {
            match self.run_once().await {
                // Drain the backlog without sleeping between deliveries.
                Ok(Some(_)) => continue,
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    warn!(error = %e, "projector tick failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    fn decode(&self, delivery: &Delivery) -> Option<BalanceEvent> {
        let envelope: SignedEnvelope = match serde_json::from_slice(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(position = %delivery.position, error = %e, "undecodable envelope");
                return None;
            }
        };

        if !envelope.verify(&self.signing_secret) {
            error!(position = %delivery.position, "envelope signature mismatch");
            return None;
        }

        match serde_json::from_value::<BalanceEvent>(envelope.payload) {
            Ok(event) => Some(event),
            Err(e) => {
                error!(position = %delivery.position, error = %e, "unparseable event payload");
                None
            }
        }
    }

    async fn apply(&self, event: &BalanceEvent) -> Result<Projection, ProjectorError> {
        let Some(entry) = LedgerEntry::from_event(event) else {
            error!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                "unknown event type"
            );
            return Ok(Projection::Skipped);
        };

        match self.ledger.append(&entry).await? {
            AppendOutcome::Inserted => {
                debug!(
                    event_id = %event.event_id,
                    user_id = %event.user_id,
                    amount = event.amount,
                    "ledger entry written"
                );
                Ok(Projection::Applied)
            }
            AppendOutcome::Duplicate => {
                debug!(event_id = %event.event_id, "event already applied");
                Ok(Projection::Duplicate)
            }
        }
    }
}
