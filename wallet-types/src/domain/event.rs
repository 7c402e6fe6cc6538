//! Balance-change events published through the outbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;
use super::money::Currency;

/// Event type tags carried in outbox records and wire payloads.
pub mod event_types {
    pub const CONVERSION_DEBITED: &str = "conversion.debited";
    pub const CONVERSION_CREDITED: &str = "conversion.credited";
    pub const DEPOSIT_COMPLETED: &str = "deposit.completed";
}

/// The aggregate type tag for account-scoped events.
pub const ACCOUNT_AGGREGATE: &str = "account";

/// The fact that a balance changed, as published to downstream consumers.
///
/// `event_id` is minted once, when the outbox record is written, and
/// identifies the logical event across any number of redeliveries. The
/// `amount` is signed: debits are negative, credits positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEvent {
    pub event_id: Uuid,
    pub aggregate_id: AccountId,
    pub aggregate_type: String,
    pub event_type: String,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: Currency,
    pub timestamp: DateTime<Utc>,
}

impl BalanceEvent {
    /// Builds an account balance event with a fresh event id.
    pub fn account_event(
        account_id: AccountId,
        user_id: Uuid,
        event_type: &str,
        amount: i64,
        currency: Currency,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id: account_id,
            aggregate_type: ACCOUNT_AGGREGATE.to_string(),
            event_type: event_type.to_string(),
            user_id,
            amount,
            currency,
            timestamp: Utc::now(),
        }
    }
}
