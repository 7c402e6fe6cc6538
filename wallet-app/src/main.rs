//! # Wallet Worker
//!
//! Binary that wires together the background half of the system:
//! - Load configuration from environment
//! - Initialize the store adapter
//! - Start the outbox relay
//! - Start the ledger projector

mod config;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_broker::InMemoryBroker;
use wallet_core::{LedgerProjector, OutboxRelay, RelayConfig};
use wallet_repo::build_store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wallet_app=debug,wallet_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting wallet worker");
    tracing::info!("Using database: {}", config.database_url);

    // Build store (handles connection and migration)
    let store = Arc::new(build_store(&config.database_url).await?);

    let broker = InMemoryBroker::new(config.broker_partitions);

    let relay = OutboxRelay::new(
        Arc::clone(&store),
        broker.clone(),
        RelayConfig {
            poll_interval: config.relay_poll_interval,
            max_backoff: config.relay_max_backoff,
            batch_size: config.relay_batch_size,
            signing_secret: config.signing_secret.clone(),
        },
    );

    let projector = LedgerProjector::new(
        Arc::clone(&store),
        broker.subscribe("ledger-projector", "wallet.account"),
        &config.signing_secret,
        config.relay_poll_interval,
    );

    let relay_task = tokio::spawn(relay.run());
    let projector_task = tokio::spawn(projector.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    relay_task.abort();
    projector_task.abort();

    Ok(())
}
