//! Runs one failing saga and publishes its log to Redis.
//!
//! ```sh
//! SAGA_REDIS_URL=localhost:6379 cargo run --example publisher --features redis
//! ```

use saga_choreography_log::{ChoreographyConfig, Producer, Saga, SagaContext};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut config = ChoreographyConfig::from_env()?;
    if config.topic == saga_choreography_log::config::DEFAULT_TOPIC {
        config.topic = "saga_test".into();
    }
    config.redis_url.get_or_insert_with(|| "localhost:6379".into());
    let transport = config.connect_transport().await?;

    let producer = Producer::new(config.topic.as_str(), transport);
    let saga = producer.new_saga("123456");
    if let Err(e) = run(&saga).await {
        tracing::warn!(error = %e, "Saga failed");
    }

    match tokio::time::timeout(Duration::from_secs(5), saga.published()).await {
        Ok(Some(Ok(ack))) => tracing::info!(receivers = ack.receivers, "Payload published"),
        Ok(Some(Err(e))) => tracing::error!(error = %e, "Publish failed"),
        Ok(None) | Err(_) => tracing::error!("Publish did not complete"),
    }

    println!("{}", serde_json::to_string_pretty(&saga.payload())?);
    Ok(())
}

async fn run(saga: &Saga) -> Result<(), String> {
    let tx = saga.clone();
    saga.execute(&SagaContext::new(), |ctx| async move {
        tx.transact(&ctx, "state_transaction_1", "message", |_| async {
            tracing::info!("do something in transaction 1");
            Ok::<(), String>(())
        })
        .await?;
        tx.transact(&ctx, "state_transaction_2", "message 2", |_| async {
            tracing::info!("do something in transaction 2");
            Err("error in tx 2".to_string())
        })
        .await
    })
    .await
}
