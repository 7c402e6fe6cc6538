//! Transactional outbox record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::BalanceEvent;

/// One row per emitted fact, written in the same store transaction as the
/// state change it describes.
///
/// The only permitted update is flipping `published` from false to true
/// (with `published_at`); everything else is immutable. Delivery retry
/// accounting lives in the relay's logs, not on the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Wraps a balance event for the outbox. The record id is the event id,
    /// so the logical event keeps one identity from write to projection.
    pub fn for_event(event: &BalanceEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: event.event_id,
            aggregate_type: event.aggregate_type.clone(),
            aggregate_id: event.aggregate_id.to_string(),
            event_type: event.event_type.clone(),
            payload: serde_json::to_value(event)?,
            published: false,
            created_at: Utc::now(),
            published_at: None,
        })
    }

    /// Topic this record publishes to, derived from the aggregate type.
    pub fn topic(&self) -> String {
        format!("wallet.{}", self.aggregate_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, Currency, event_types};

    #[test]
    fn test_record_carries_event_identity() {
        let event = BalanceEvent::account_event(
            AccountId::new(),
            Uuid::new_v4(),
            event_types::DEPOSIT_COMPLETED,
            500,
            Currency::USD,
        );
        let record = OutboxRecord::for_event(&event).unwrap();
        assert_eq!(record.id, event.event_id);
        assert_eq!(record.aggregate_id, event.aggregate_id.to_string());
        assert!(!record.published);
        assert_eq!(record.topic(), "wallet.account");

        let back: BalanceEvent = serde_json::from_value(record.payload).unwrap();
        assert_eq!(back, event);
    }
}
