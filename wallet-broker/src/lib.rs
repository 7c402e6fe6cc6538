//! # Wallet Broker
//!
//! In-memory partitioned event transport implementing the `EventPublisher`
//! and `EventConsumer` ports. Topics are split into a fixed number of
//! partitions; messages with the same key always land on the same
//! partition, and each partition is an append-only log. Consumer groups
//! track a committed offset per partition, so a delivery that is polled
//! but never acked comes back on a later poll.
//!
//! An availability toggle lets tests take the transport down and watch
//! the producer side retry.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use wallet_types::{BrokerError, Delivery, EventConsumer, EventPublisher, StreamPosition};

// ─────────────────────────────────────────────────────────────────────────────
// Broker state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct BrokerInner {
    /// topic -> partition -> append-only log of payloads.
    topics: HashMap<String, Vec<Vec<Vec<u8>>>>,
    /// (group, topic, partition) -> committed offset (next to deliver).
    offsets: HashMap<(String, String, u32), u64>,
}

impl BrokerInner {
    fn topic_mut(&mut self, topic: &str, partitions: u32) -> &mut Vec<Vec<Vec<u8>>> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions as usize])
    }
}

/// In-memory partitioned broker.
///
/// Cloning is cheap; clones share the same logs and offsets.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Mutex<BrokerInner>>,
    partitions: u32,
    available: Arc<AtomicBool>,
}

impl InMemoryBroker {
    /// Creates a broker whose topics each have `partitions` partitions.
    pub fn new(partitions: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BrokerInner::default())),
            partitions: partitions.max(1),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Toggles transport availability. While unavailable, publish and poll
    /// fail with [`BrokerError::Unavailable`]; nothing already appended is
    /// lost.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// The partition a key maps to. Stable for the broker's lifetime.
    pub fn partition_for(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as u32
    }

    /// Opens a consumer in `group` subscribed to `topic`.
    ///
    /// Groups are independent: each tracks its own committed offsets, so
    /// two groups both see every message.
    pub fn subscribe(&self, group: &str, topic: &str) -> InMemoryConsumer {
        InMemoryConsumer {
            inner: Arc::clone(&self.inner),
            available: Arc::clone(&self.available),
            partitions: self.partitions,
            group: group.to_string(),
            topic: topic.to_string(),
            cursor: 0,
        }
    }

    /// Total messages appended to a topic, across partitions.
    pub async fn topic_len(&self, topic: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .topics
            .get(topic)
            .map(|parts| parts.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("broker offline".to_string()));
        }

        let partition = self.partition_for(key);
        let mut inner = self.inner.lock().await;
        let logs = inner.topic_mut(topic, self.partitions);
        logs[partition as usize].push(payload.to_vec());

        debug!(topic, key, partition, "message appended");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Consumer
// ─────────────────────────────────────────────────────────────────────────────

/// A consumer handle bound to one group and topic.
///
/// `poll` walks partitions round-robin and returns the message at the
/// group's committed offset; until `ack` moves that offset forward the
/// same message is returned again.
pub struct InMemoryConsumer {
    inner: Arc<Mutex<BrokerInner>>,
    available: Arc<AtomicBool>,
    partitions: u32,
    group: String,
    topic: String,
    cursor: u32,
}

#[async_trait]
impl EventConsumer for InMemoryConsumer {
    async fn poll(&mut self) -> Result<Option<Delivery>, BrokerError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("broker offline".to_string()));
        }

        let inner = self.inner.lock().await;
        let Some(logs) = inner.topics.get(&self.topic) else {
            return Ok(None);
        };

        for i in 0..self.partitions {
            let partition = (self.cursor + i) % self.partitions;
            let key = (self.group.clone(), self.topic.clone(), partition);
            let committed = inner.offsets.get(&key).copied().unwrap_or(0);
            let log = &logs[partition as usize];

            if (committed as usize) < log.len() {
                self.cursor = (partition + 1) % self.partitions;
                return Ok(Some(Delivery {
                    position: StreamPosition {
                        topic: self.topic.clone(),
                        partition,
                        offset: committed,
                    },
                    payload: log[committed as usize].clone(),
                }));
            }
        }

        Ok(None)
    }

    async fn ack(&mut self, position: &StreamPosition) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().await;
        if !inner.topics.contains_key(&position.topic) {
            return Err(BrokerError::UnknownTopic(position.topic.clone()));
        }

        let key = (self.group.clone(), position.topic.clone(), position.partition);
        let committed = inner.offsets.entry(key).or_insert(0);
        if position.offset >= *committed {
            *committed = position.offset + 1;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_preserves_order() {
        let broker = InMemoryBroker::new(4);
        let mut consumer = broker.subscribe("g1", "t");

        for i in 0..3u8 {
            broker.publish("t", "acct-1", &[i]).await.unwrap();
        }

        for expected in 0..3u8 {
            let delivery = consumer.poll().await.unwrap().unwrap();
            assert_eq!(delivery.payload, vec![expected]);
            consumer.ack(&delivery.position).await.unwrap();
        }
        assert!(consumer.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unacked_delivery_comes_back() {
        let broker = InMemoryBroker::new(1);
        let mut consumer = broker.subscribe("g1", "t");

        broker.publish("t", "k", b"payload").await.unwrap();

        let first = consumer.poll().await.unwrap().unwrap();
        let second = consumer.poll().await.unwrap().unwrap();
        assert_eq!(first.position, second.position);
        assert_eq!(first.payload, second.payload);

        consumer.ack(&second.position).await.unwrap();
        assert!(consumer.poll().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_groups_are_independent() {
        let broker = InMemoryBroker::new(2);
        let mut a = broker.subscribe("group-a", "t");
        let mut b = broker.subscribe("group-b", "t");

        broker.publish("t", "k", b"m").await.unwrap();

        let da = a.poll().await.unwrap().unwrap();
        a.ack(&da.position).await.unwrap();
        assert!(a.poll().await.unwrap().is_none());

        // Group B still sees the message after A acked it.
        let db = b.poll().await.unwrap().unwrap();
        assert_eq!(db.payload, b"m".to_vec());
    }

    #[tokio::test]
    async fn test_outage_rejects_then_recovers() {
        let broker = InMemoryBroker::new(2);
        let mut consumer = broker.subscribe("g", "t");

        broker.publish("t", "k", b"before").await.unwrap();
        broker.set_available(false);

        assert!(matches!(
            broker.publish("t", "k", b"down").await,
            Err(BrokerError::Unavailable(_))
        ));
        assert!(matches!(
            consumer.poll().await,
            Err(BrokerError::Unavailable(_))
        ));

        broker.set_available(true);
        let delivery = consumer.poll().await.unwrap().unwrap();
        assert_eq!(delivery.payload, b"before".to_vec());
    }

    #[tokio::test]
    async fn test_ack_unknown_topic() {
        let broker = InMemoryBroker::new(1);
        let mut consumer = broker.subscribe("g", "missing");

        let position = StreamPosition {
            topic: "missing".to_string(),
            partition: 0,
            offset: 0,
        };
        assert!(matches!(
            consumer.ack(&position).await,
            Err(BrokerError::UnknownTopic(_))
        ));
    }

    #[tokio::test]
    async fn test_keys_spread_but_stay_stable() {
        let broker = InMemoryBroker::new(8);
        let p1 = broker.partition_for("acct-1");
        assert_eq!(p1, broker.partition_for("acct-1"));
        assert!(p1 < 8);
    }
}
