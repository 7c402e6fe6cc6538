//! Append-only audit ledger entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{BalanceEvent, event_types};
use super::money::Currency;

/// The kind of balance change an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    ConversionDebit,
    ConversionCredit,
    Deposit,
}

impl LedgerEntryType {
    /// Maps a wire event type to an entry type; `None` for unknown tags,
    /// which the projector treats as a schema mismatch.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            event_types::CONVERSION_DEBITED => Some(Self::ConversionDebit),
            event_types::CONVERSION_CREDITED => Some(Self::ConversionCredit),
            event_types::DEPOSIT_COMPLETED => Some(Self::Deposit),
            _ => None,
        }
    }
}

impl AsRef<str> for LedgerEntryType {
    fn as_ref(&self) -> &str {
        match self {
            Self::ConversionDebit => "CONVERSION_DEBIT",
            Self::ConversionCredit => "CONVERSION_CREDIT",
            Self::Deposit => "DEPOSIT",
        }
    }
}

impl std::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// One row per accepted event, immutable once written.
///
/// The `idempotency_key` is UNIQUE in the store; that constraint is what
/// turns at-least-once delivery into exactly-once application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: Currency,
    pub entry_type: LedgerEntryType,
    pub description: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Builds the entry for an accepted event.
    ///
    /// The idempotency key is the event id minted at the outbox write, so
    /// both relay republishes (new offsets, same event) and consumer
    /// redeliveries (same offset) collapse onto one entry. Returns `None`
    /// when the event type is unknown.
    pub fn from_event(event: &BalanceEvent) -> Option<Self> {
        let entry_type = LedgerEntryType::from_event_type(&event.event_type)?;
        Some(Self {
            id: Uuid::new_v4(),
            payment_id: event.aggregate_id.into_uuid(),
            user_id: event.user_id,
            amount: event.amount,
            currency: event.currency,
            entry_type,
            description: format!("{} {} {}", event.event_type, event.amount, event.currency),
            idempotency_key: event.event_id.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Reconstructs an entry from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: Uuid,
        payment_id: Uuid,
        user_id: Uuid,
        amount: i64,
        currency: Currency,
        entry_type: LedgerEntryType,
        description: String,
        idempotency_key: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payment_id,
            user_id,
            amount,
            currency,
            entry_type,
            description,
            idempotency_key,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountId;

    #[test]
    fn test_entry_from_debit_event() {
        let event = BalanceEvent::account_event(
            AccountId::new(),
            Uuid::new_v4(),
            event_types::CONVERSION_DEBITED,
            -10_000,
            Currency::USD,
        );
        let entry = LedgerEntry::from_event(&event).unwrap();
        assert_eq!(entry.entry_type, LedgerEntryType::ConversionDebit);
        assert_eq!(entry.amount, -10_000);
        assert_eq!(entry.idempotency_key, event.event_id.to_string());
        assert_eq!(entry.payment_id, event.aggregate_id.into_uuid());
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let mut event = BalanceEvent::account_event(
            AccountId::new(),
            Uuid::new_v4(),
            event_types::DEPOSIT_COMPLETED,
            500,
            Currency::NGN,
        );
        event.event_type = "account.closed".to_string();
        assert!(LedgerEntry::from_event(&event).is_none());
    }
}
