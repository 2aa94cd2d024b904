//! Error types for transport, codec, publication and compensation

/// Error raised by a pub/sub transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Topic pattern is not a valid glob
    #[error("invalid topic pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Rejected pattern
        pattern: Box<str>,
        /// Parser message
        reason: Box<str>,
    },
    /// Broker unreachable or refused the connection
    #[error("connection failed: {0}")]
    Connect(Box<str>),
    /// Transport compiled out of this build
    #[error("transport '{0}' is not available in this build")]
    Unsupported(Box<str>),
    /// Subscription already closed
    #[error("subscription closed")]
    Closed,
    /// Redis client error
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Error encoding or decoding a saga payload
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Payload could not be serialized
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),
    /// Bytes are not a valid payload
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Error from the background publication of a finished saga
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Payload encoding failed
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Transport rejected the publish
    #[error("publish to '{topic}' failed: {source}")]
    Transport {
        /// Topic published to
        topic: Box<str>,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },
    /// The publish task panicked or was cancelled with the runtime
    #[error("publish task aborted: {0}")]
    Aborted(Box<str>),
}

/// Fatal consumer error, surfaced at most once through `Consumer::err`
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// Subscribing to the topic failed
    #[error("failed to subscribe to '{topic}': {source}")]
    Subscribe {
        /// Topic pattern subscribed to
        topic: Box<str>,
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },
    /// The subscription ended without `Consumer::stop` being called
    #[error("subscription to '{topic}' closed unexpectedly")]
    SubscriptionClosed {
        /// Subscribed topic pattern
        topic: Box<str>,
    },
}

/// Error returned by a compensation handler
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompensationError {
    /// Compensation did not apply
    #[error("compensation failed: {reason}")]
    Failed {
        /// Error description
        reason: Box<str>,
    },
    /// Compensation may or may not have applied
    #[error("compensation outcome ambiguous: {reason}")]
    Ambiguous {
        /// Error description
        reason: Box<str>,
    },
}

impl CompensationError {
    /// Compensation did not apply
    pub fn failed(reason: impl Into<Box<str>>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Compensation may have partially applied
    pub fn ambiguous(reason: impl Into<Box<str>>) -> Self {
        Self::Ambiguous {
            reason: reason.into(),
        }
    }

    /// Check if state is ambiguous
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    /// Error description
    pub fn reason(&self) -> &str {
        match self {
            Self::Failed { reason } | Self::Ambiguous { reason } => reason,
        }
    }
}

/// Invalid or unreadable configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration sources could not be read or deserialized
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    /// A value failed validation
    #[error("invalid configuration: {0}")]
    Invalid(Box<str>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensation_error_kinds() {
        let err = CompensationError::ambiguous("timeout talking to bank");
        assert!(err.is_ambiguous());
        assert_eq!(err.reason(), "timeout talking to bank");
        assert_eq!(
            CompensationError::failed("nope").to_string(),
            "compensation failed: nope"
        );
    }

    #[test]
    fn publish_error_wraps_transport_source() {
        let err = PublishError::Transport {
            topic: "saga_test".into(),
            source: TransportError::Closed,
        };
        assert_eq!(err.to_string(), "publish to 'saga_test' failed: subscription closed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
