//! # Wallet Core
//!
//! Business orchestration for the wallet consistency core:
//! - `service` - the conversion engine (pessimistic and optimistic paths)
//! - `relay` - the transactional outbox relay
//! - `projector` - the idempotent ledger projector
//! - `exchange` - exchange adapters (simulator and HTTP client)
//! - `security` - signed transport envelopes

pub mod exchange;
pub mod projector;
pub mod relay;
pub mod security;
pub mod service;

pub use exchange::{HttpExchange, SimExchange};
pub use projector::{LedgerProjector, Projection, ProjectorError};
pub use relay::{OutboxRelay, RelayConfig, RelayError};
pub use security::SignedEnvelope;
pub use service::WalletService;

#[cfg(test)]
mod service_tests;
