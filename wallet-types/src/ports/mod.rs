//! Port traits implemented by adapters.

pub mod broker;
pub mod exchange;
pub mod repository;

pub use broker::{BrokerError, Delivery, EventConsumer, EventPublisher, StreamPosition};
pub use exchange::{ExchangeApi, ExchangeError, Execution, Quote};
pub use repository::{AccountStore, AccountTx, AppendOutcome, LedgerStore, OutboxStore};
