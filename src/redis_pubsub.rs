//! Redis pub/sub transport
//!
//! Publishes with `PUBLISH` over a shared `ConnectionManager` and subscribes
//! with `PSUBSCRIBE` on a dedicated connection per subscription.

use crate::transport::{Delivery, PublishAck, Subscription, Transport};
use crate::TransportError;
use async_trait::async_trait;
use futures_util::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, info};

/// Redis-backed transport
pub struct RedisTransport {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisTransport {
    /// Connect and verify the server answers `PING`.
    ///
    /// Accepts a full `redis://` URL or a bare `host:port`.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        if url.is_empty() {
            return Err(TransportError::Connect("empty redis url".into()));
        }
        let url = if url.contains("://") {
            url.to_owned()
        } else {
            format!("redis://{url}")
        };

        let client = Client::open(url.as_str())?;
        let mut publisher = ConnectionManager::new(client.clone()).await?;
        let pong: String = redis::cmd("PING").query_async(&mut publisher).await?;
        debug!(reply = %pong, "Redis ping");

        info!(url = %url, "Connected to Redis");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Transport for RedisTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishAck, TransportError> {
        let mut conn = self.publisher.clone();
        let receivers: u64 = conn.publish(topic, payload).await?;
        debug!(topic = %topic, receivers, "Payload published");
        Ok(PublishAck { receivers })
    }

    async fn subscribe(&self, pattern: &str) -> Result<Box<dyn Subscription>, TransportError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;
        debug!(pattern = %pattern, "Subscribed");

        let messages = pubsub
            .into_on_message()
            .map(|msg| Delivery {
                topic: msg.get_channel_name().into(),
                payload: msg.get_payload_bytes().to_vec(),
            })
            .boxed();
        Ok(Box::new(RedisSubscription {
            messages: Some(messages),
        }))
    }
}

struct RedisSubscription {
    messages: Option<BoxStream<'static, Delivery>>,
}

#[async_trait]
impl Subscription for RedisSubscription {
    async fn receive(&mut self) -> Option<Delivery> {
        self.messages.as_mut()?.next().await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        // Dropping the stream drops the pub/sub connection.
        self.messages = None;
        Ok(())
    }
}
