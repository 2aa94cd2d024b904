//! In-process transport
//!
//! Built on `tokio::sync::broadcast`: every subscription sees every publish and
//! filters by its topic pattern. Intended for tests, demos and single-process
//! deployments.

use crate::transport::{Delivery, PublishAck, Subscription, Transport};
use crate::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default broadcast buffer size
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// In-memory pub/sub transport. Clones share the same channel.
#[derive(Clone)]
pub struct InMemoryTransport {
    sender: broadcast::Sender<Arc<Delivery>>,
}

impl InMemoryTransport {
    /// Create a transport whose subscribers buffer up to `capacity` payloads
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishAck, TransportError> {
        let delivery = Arc::new(Delivery {
            topic: topic.into(),
            payload,
        });
        // No subscribers is not an error, mirroring Redis PUBLISH returning 0.
        let receivers = self.sender.send(delivery).unwrap_or(0);
        tracing::debug!(topic = %topic, receivers, "Payload published");
        Ok(PublishAck {
            receivers: receivers as u64,
        })
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let matcher = glob::Pattern::new(pattern).map_err(|e| TransportError::InvalidPattern {
            pattern: pattern.into(),
            reason: e.to_string().into(),
        })?;
        tracing::debug!(pattern = %pattern, "Subscribed");
        Ok(Box::new(InMemorySubscription {
            pattern: matcher,
            receiver: Some(self.sender.subscribe()),
        }))
    }
}

struct InMemorySubscription {
    pattern: glob::Pattern,
    receiver: Option<broadcast::Receiver<Arc<Delivery>>>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn receive(&mut self) -> Option<Delivery> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(delivery) if self.pattern.matches(&delivery.topic) => {
                    return Some(Delivery::clone(&delivery));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        pattern = %self.pattern,
                        skipped,
                        "Subscriber lagged, payloads dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.receiver = None;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.receiver = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_without_subscribers_reports_zero_receivers() {
        let transport = InMemoryTransport::default();
        let ack = transport.publish("saga_test", b"x".to_vec()).await.unwrap();
        assert_eq!(ack.receivers, 0);
    }

    #[tokio::test]
    async fn subscription_filters_by_pattern() {
        let transport = InMemoryTransport::new(16);
        let mut orders = transport.subscribe("orders.*").await.unwrap();

        transport.publish("billing.created", b"b".to_vec()).await.unwrap();
        let ack = transport.publish("orders.created", b"o".to_vec()).await.unwrap();
        assert_eq!(ack.receivers, 1);

        let delivery = orders.receive().await.unwrap();
        assert_eq!(&*delivery.topic, "orders.created");
        assert_eq!(delivery.payload, b"o");
    }

    #[tokio::test]
    async fn closed_subscription_yields_nothing() {
        let transport = InMemoryTransport::new(16);
        let mut sub = transport.subscribe("t").await.unwrap();
        sub.close().await.unwrap();
        transport.publish("t", b"late".to_vec()).await.unwrap();

        let next = tokio::time::timeout(Duration::from_millis(50), sub.receive()).await;
        assert_eq!(next.unwrap(), None);
        assert_eq!(transport.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn rejects_invalid_patterns() {
        let transport = InMemoryTransport::default();
        let err = transport.subscribe("[unterminated").await.err().unwrap();
        assert!(matches!(err, TransportError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn lagging_subscriber_keeps_receiving() {
        let transport = InMemoryTransport::new(2);
        let mut sub = transport.subscribe("t").await.unwrap();
        for i in 0..5u8 {
            transport.publish("t", vec![i]).await.unwrap();
        }
        let delivery = sub.receive().await.unwrap();
        assert_eq!(delivery.payload, vec![3]);
    }
}
