//! Message transport port: ordered, partitioned, at-least-once.

/// Error type for broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),
}

/// A message's position in the source stream.
///
/// Consumers track and acknowledge positions; per-partition order is the
/// only order the transport guarantees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamPosition {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

impl std::fmt::Display for StreamPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.topic, self.partition, self.offset)
    }
}

/// One delivered message.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub position: StreamPosition,
    pub payload: Vec<u8>,
}

/// Producer side: publishes opaque bytes under a partition key.
///
/// Messages with the same key land on the same partition, so all facts
/// about one aggregate are observed in order by any single consumer.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError>;
}

/// Consumer side: at-least-once delivery with explicit acknowledgment.
///
/// A delivery that is polled but never acked is delivered again; acking
/// advances the consumer group's committed position past it.
#[async_trait::async_trait]
pub trait EventConsumer: Send {
    /// Next un-acknowledged delivery, or `None` when caught up.
    async fn poll(&mut self) -> Result<Option<Delivery>, BrokerError>;

    /// Commits the position, acknowledging the delivery at it.
    async fn ack(&mut self, position: &StreamPosition) -> Result<(), BrokerError>;
}
