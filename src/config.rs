//! Choreography configuration
//!
//! Settings are read from `SAGA_*` environment variables:
//!
//! | Variable                 | Field              | Default     |
//! |--------------------------|--------------------|-------------|
//! | `SAGA_TOPIC`             | `topic`            | `saga`      |
//! | `SAGA_REDIS_URL`         | `redis_url`        | unset       |
//! | `SAGA_CHANNEL_CAPACITY`  | `channel_capacity` | `1024`      |
//!
//! Without a Redis URL the in-memory transport is used.

use crate::memory::{InMemoryTransport, DEFAULT_CHANNEL_CAPACITY};
use crate::transport::Transport;
use crate::{ConfigError, TransportError};
use ::config::Environment;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Environment variable prefix
pub const CONFIG_ENV_PREFIX: &str = "SAGA";

/// Topic used when none is configured
pub const DEFAULT_TOPIC: &str = "saga";

/// Topic and transport settings shared by producers and consumers.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChoreographyConfig {
    /// Pub/sub topic carrying saga payloads
    pub topic: String,
    /// Redis server URL; in-memory transport when unset
    pub redis_url: Option<String>,
    /// Buffer size of the in-memory broadcast channel
    pub channel_capacity: usize,
}

impl Default for ChoreographyConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_owned(),
            redis_url: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ChoreographyConfig {
    /// Load from `SAGA_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(CONFIG_ENV_PREFIX))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let config: Self = ::config::Config::builder()
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject an empty topic or a zero channel capacity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigError::Invalid("topic must not be empty".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Build the configured transport.
    pub async fn connect_transport(&self) -> Result<Arc<dyn Transport>, TransportError> {
        match self.redis_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => connect_redis(url).await,
            None => {
                info!(capacity = self.channel_capacity, "Using in-memory transport");
                Ok(Arc::new(InMemoryTransport::new(self.channel_capacity)))
            }
        }
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str) -> Result<Arc<dyn Transport>, TransportError> {
    let transport = crate::RedisTransport::connect(url).await?;
    info!(url, "Using redis transport");
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_url: &str) -> Result<Arc<dyn Transport>, TransportError> {
    Err(TransportError::Unsupported("redis".into()))
}
