//! Saga producer

use crate::observer::{SagaObserver, TracingObserver};
use crate::transport::Transport;
use crate::{Saga, SagaId};
use std::sync::Arc;

/// Binds a topic and transport and mints [`Saga`] instances.
#[derive(Clone)]
pub struct Producer {
    topic: Arc<str>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn SagaObserver>,
}

impl Producer {
    /// Producer publishing to `topic` through `transport`
    pub fn new(topic: impl Into<Arc<str>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            topic: topic.into(),
            transport,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default [`TracingObserver`]
    pub fn with_observer(mut self, observer: Arc<dyn SagaObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Topic sagas publish to
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Create a saga. No I/O and no uniqueness check on `saga_id`.
    pub fn new_saga(&self, saga_id: impl Into<SagaId>) -> Saga {
        Saga::new(
            saga_id.into(),
            self.topic.clone(),
            self.transport.clone(),
            self.observer.clone(),
        )
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").field("topic", &self.topic).finish()
    }
}
