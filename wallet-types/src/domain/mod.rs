//! Domain models for the wallet consistency core.

pub mod account;
pub mod event;
pub mod ledger;
pub mod money;
pub mod outbox;

pub use account::{Account, AccountId, Balances};
pub use event::{BalanceEvent, event_types};
pub use ledger::{LedgerEntry, LedgerEntryType};
pub use money::{Currency, Money};
pub use outbox::OutboxRecord;
