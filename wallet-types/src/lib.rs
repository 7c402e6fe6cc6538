//! # Wallet Types
//!
//! Domain types and port traits for the wallet consistency core.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, Balances, Account, OutboxRecord, LedgerEntry)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Request and receipt types for the service boundary
//! - `error/` - Domain, repository, and core error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Account, AccountId, Balances, BalanceEvent, Currency, LedgerEntry, LedgerEntryType, Money,
    OutboxRecord, event_types,
};
pub use dto::*;
pub use error::{CoreError, DomainError, RepoError};
pub use ports::{
    AccountStore, AccountTx, AppendOutcome, BrokerError, Delivery, EventConsumer, EventPublisher,
    ExchangeApi, ExchangeError, Execution, LedgerStore, OutboxStore, Quote, StreamPosition,
};
