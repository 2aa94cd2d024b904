//! Producer and consumer in one process over the in-memory transport.
//!
//! ```sh
//! RUST_LOG=info cargo run --example in_memory
//! ```

use saga_choreography_log::{
    CompensationError, Consumer, InMemoryTransport, Message, Producer, SagaContext, Transport,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const TOPIC: &str = "orders";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let transport: Arc<dyn Transport> = Arc::new(InMemoryTransport::default());

    let consumer = Arc::new(Consumer::new(TOPIC, transport.clone()));
    consumer.register_compensation("reserve_stock", |message: Message| async move {
        tracing::info!(saga_id = %message.saga_id, sku = %message.data["sku"], "Releasing stock");
        Ok::<(), CompensationError>(())
    });
    consumer.register_compensation("charge_card", |message: Message| async move {
        tracing::info!(saga_id = %message.saga_id, "Refunding card");
        Ok::<(), CompensationError>(())
    });
    let runner = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.run().await }
    });
    // Wait for the subscription before publishing.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let producer = Producer::new(TOPIC, transport);
    let saga = producer.new_saga("order-17");
    let tx = saga.clone();
    let result = saga
        .execute(&SagaContext::new(), |ctx| async move {
            tx.transact(&ctx, "reserve_stock", json!({"sku": "A1", "qty": 2}), |_| async {
                Ok::<(), String>(())
            })
            .await?;
            tx.transact(&ctx, "charge_card", json!({"amount": 40}), |_| async {
                Ok::<(), String>(())
            })
            .await?;
            tx.transact(&ctx, "ship", json!({"carrier": "ups"}), |_| async {
                Err("carrier unavailable".to_string())
            })
            .await
        })
        .await;
    tracing::info!(?result, outcome = ?saga.payload().outcome(), "Saga finished");

    if let Some(published) = saga.published().await {
        let ack = published?;
        tracing::info!(receivers = ack.receivers, "Payload published");
    }

    // Give the compensations a moment to run.
    tokio::time::sleep(Duration::from_millis(100)).await;
    consumer.stop();
    runner.await?;
    tracing::info!(stats = ?consumer.stats(), "Done");
    Ok(())
}
