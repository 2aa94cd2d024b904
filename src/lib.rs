//! Saga execution with replayable compensation logs over pub/sub
//!
//! A [`Producer`] mints [`Saga`]s. A saga runs its steps in-process through
//! [`Saga::transact`], records every state transition in an ordered log and,
//! when a step fails, appends compensation entries for the steps that already
//! ran. The finished log is published as a [`Payload`] to a topic. A
//! [`Consumer`] on the other side decodes payloads and invokes the
//! [`CompensationHandler`] registered for each compensated step.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::default());
//!
//! // 1. Consumer side: register compensations and run the loop
//! let consumer = Arc::new(Consumer::new("orders", transport.clone()));
//! consumer.register_compensation("reserve_stock", |message: Message| async move {
//!     release_stock(&message.data).await.map_err(CompensationError::failed)
//! });
//! tokio::spawn({
//!     let consumer = consumer.clone();
//!     async move { consumer.run().await }
//! });
//!
//! // 2. Producer side: run a saga
//! let producer = Producer::new("orders", transport);
//! let saga = producer.new_saga("order-17");
//! saga.execute(&SagaContext::new(), |ctx| {
//!     let saga = saga.clone();
//!     async move {
//!         saga.transact(&ctx, "reserve_stock", json!({"sku": "A1"}), reserve).await?;
//!         saga.transact(&ctx, "charge_card", json!({"amount": 40}), charge).await
//!     }
//! })
//! .await?;
//! ```

#![warn(missing_docs)]

// === Core Types ===
mod context;
mod errors;
mod events;
pub mod state;

// === Traits ===
mod traits;
mod transport;

// === Transports ===
mod memory;
#[cfg(feature = "redis")]
mod redis_pubsub;

// === Engine ===
mod consumer;
mod producer;
mod saga;

// === Configuration ===
pub mod config;

// === Observability ===
mod observer;
mod stats;

// === Test Harness ===
#[cfg(any(test, feature = "test-harness"))]
pub mod testing;

// === Re-exports ===

// Types
pub use context::{SagaContext, SagaId};
pub use state::StateKind;

// Events
pub use events::{LogEntry, Message, Payload, SagaOutcome, TransactionRecord};

// Errors
pub use errors::{
    CodecError, CompensationError, ConfigError, ConsumerError, PublishError, TransportError,
};

// Traits
pub use traits::CompensationHandler;
pub use transport::{Delivery, PublishAck, Subscription, Transport};

// Transports
pub use memory::{InMemoryTransport, DEFAULT_CHANNEL_CAPACITY};
#[cfg(feature = "redis")]
pub use redis_pubsub::RedisTransport;

// Engine
pub use consumer::Consumer;
pub use producer::Producer;
pub use saga::Saga;

// Configuration
pub use self::config::ChoreographyConfig;

// Observability
pub use observer::{NoOpObserver, SagaObserver, TracingObserver};
pub use stats::{ConsumerStats, ConsumerStatsSnapshot};
