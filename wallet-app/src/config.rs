//! Configuration loading from environment.

use std::env;
use std::time::Duration;

/// Application configuration.
pub struct Config {
    pub database_url: String,
    pub relay_poll_interval: Duration,
    pub relay_max_backoff: Duration,
    pub relay_batch_size: i64,
    pub broker_partitions: u32,
    pub signing_secret: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let relay_poll_interval = Duration::from_millis(
            env::var("RELAY_POLL_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()?,
        );

        let relay_max_backoff = Duration::from_millis(
            env::var("RELAY_MAX_BACKOFF_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()?,
        );

        let relay_batch_size = env::var("RELAY_BATCH_SIZE")
            .unwrap_or_else(|_| "100".to_string())
            .parse()?;

        let broker_partitions = env::var("BROKER_PARTITIONS")
            .unwrap_or_else(|_| "4".to_string())
            .parse()?;

        let signing_secret = match env::var("SIGNING_SECRET") {
            Ok(secret) => secret,
            Err(_) => {
                tracing::warn!("SIGNING_SECRET not set; using development default");
                "dev-signing-secret".to_string()
            }
        };

        Ok(Self {
            database_url,
            relay_poll_interval,
            relay_max_backoff,
            relay_batch_size,
            broker_partitions,
            signing_secret,
        })
    }
}
