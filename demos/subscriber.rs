//! Listens for saga payloads on Redis and logs compensations.
//!
//! Stops on a fatal consumer error, after 30 seconds, or on Ctrl-C.
//!
//! ```sh
//! SAGA_REDIS_URL=localhost:6379 cargo run --example subscriber --features redis
//! ```

use saga_choreography_log::{ChoreographyConfig, CompensationError, Consumer, Message};
use std::sync::Arc;
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

    let consumer = Arc::new(Consumer::new(config.topic.as_str(), transport));
    consumer.register_compensation("state_transaction_1", |message: Message| async move {
        log_compensation("tx 1", &message)
    });
    consumer.register_compensation("state_transaction_2", |message: Message| async move {
        log_compensation("tx 2", &message)
    });

    let runner = tokio::spawn({
        let consumer = consumer.clone();
        async move { consumer.run().await }
    });

    tokio::select! {
        Some(e) = consumer.err() => tracing::error!(error = %e, "Consumer failed"),
        _ = tokio::time::sleep(Duration::from_secs(30)) => {
            tracing::info!("Timeout, stopping");
            consumer.stop();
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping");
            consumer.stop();
        }
    }

    runner.await?;
    tracing::info!(stats = ?consumer.stats(), "Done");
    Ok(())
}

fn log_compensation(label: &str, message: &Message) -> Result<(), CompensationError> {
    let json = serde_json::to_string(message).map_err(|e| CompensationError::failed(e.to_string()))?;
    tracing::info!(%label, %json, "Compensation message from saga log");
    Ok(())
}
