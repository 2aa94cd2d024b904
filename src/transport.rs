//! Pub/sub transport seam
//!
//! The engine and the consumer only ever see opaque byte payloads on named
//! topics. Delivery is at-least-once and unordered across subscribers.

use crate::TransportError;
use async_trait::async_trait;

/// Broker acknowledgement of a publish
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishAck {
    /// Number of subscribers the payload was handed to
    pub receivers: u64,
}

/// A payload received on a subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// Concrete topic the payload was published to
    pub topic: Box<str>,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

/// Named-topic publish/subscribe channel
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Publish `payload` to `topic`
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishAck, TransportError>;

    /// Subscribe to every topic matching the glob-style `pattern`
    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, TransportError>;
}

/// Stream of deliveries for one subscription
#[async_trait]
pub trait Subscription: Send {
    /// Wait for the next delivery. `None` once the subscription is closed.
    async fn receive(&mut self) -> Option<Delivery>;

    /// Release the subscription
    async fn close(&mut self) -> Result<(), TransportError>;
}
