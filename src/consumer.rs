//! Compensation consumer
//!
//! Subscribes to the saga topic, decodes every delivered [`Payload`] and hands
//! each compensation entry to the handler registered for its origin step.
//! Each payload is dispatched on its own task: handlers for one payload run
//! one after another in log order (most recent step first), while different
//! payloads are compensated concurrently.

use crate::events::{Message, Payload};
use crate::observer::{SagaObserver, TracingObserver};
use crate::stats::{ConsumerStats, ConsumerStatsSnapshot};
use crate::traits::CompensationHandler;
use crate::transport::{Delivery, Transport};
use crate::{ConsumerError, SagaId};
use std::collections::hash_map::{Entry, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

type HandlerTable = HashMap<Box<str>, Arc<dyn CompensationHandler>>;

/// Receives saga payloads and dispatches compensation handlers.
///
/// Share it behind an `Arc` to run the loop on one task and stop it from
/// another:
///
/// ```rust,ignore
/// let consumer = Arc::new(Consumer::new("saga_test", transport));
/// consumer.register_compensation("reserve_stock", release_stock);
/// let runner = tokio::spawn({
///     let consumer = consumer.clone();
///     async move { consumer.run().await }
/// });
/// // ...
/// consumer.stop();
/// runner.await?;
/// ```
pub struct Consumer {
    topic: Box<str>,
    transport: Arc<dyn Transport>,
    handlers: RwLock<HandlerTable>,
    observer: Arc<dyn SagaObserver>,
    stats: Arc<ConsumerStats>,
    shutdown: CancellationToken,
    started: AtomicBool,
    fatal_tx: Mutex<Option<oneshot::Sender<ConsumerError>>>,
    fatal_rx: tokio::sync::Mutex<Option<oneshot::Receiver<ConsumerError>>>,
    tasks: TaskTracker,
}

impl Consumer {
    /// Create a consumer for `topic`. Call [`Consumer::run`] to start it.
    pub fn new(topic: impl Into<Box<str>>, transport: Arc<dyn Transport>) -> Self {
        let (fatal_tx, fatal_rx) = oneshot::channel();
        Self {
            topic: topic.into(),
            transport,
            handlers: RwLock::new(HashMap::new()),
            observer: Arc::new(TracingObserver),
            stats: Arc::new(ConsumerStats::new()),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            fatal_tx: Mutex::new(Some(fatal_tx)),
            fatal_rx: tokio::sync::Mutex::new(Some(fatal_rx)),
            tasks: TaskTracker::new(),
        }
    }

    /// Replace the default [`TracingObserver`]
    pub fn with_observer(mut self, observer: Arc<dyn SagaObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Subscribed topic pattern
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Register the compensation handler for `step`.
    ///
    /// The first registration for a step wins; later ones are ignored and
    /// return `false`. Registering while the consumer runs is allowed.
    pub fn register_compensation(
        &self,
        step: impl Into<Box<str>>,
        handler: impl CompensationHandler,
    ) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handlers.entry(step.into()) {
            Entry::Occupied(entry) => {
                debug!(step = %entry.key(), "Compensation already registered, ignoring");
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(handler));
                true
            }
        }
    }

    /// True when a handler is registered for `step`
    pub fn has_compensation(&self, step: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(step)
    }

    /// Snapshot of the dispatch counters
    pub fn stats(&self) -> ConsumerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Subscribe and process deliveries until [`Consumer::stop`] is called or
    /// the subscription ends.
    ///
    /// A subscribe failure, or the subscription ending while not stopped, is
    /// reported through [`Consumer::err`]. Returns once
    /// every dispatched compensation has finished. A consumer runs once.
    pub async fn run(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(topic = %self.topic, "Consumer already started, ignoring");
            return;
        }

        let mut subscription = match self.transport.subscribe(&self.topic).await {
            Ok(subscription) => subscription,
            Err(source) => {
                error!(topic = %self.topic, error = %source, "Subscribe failed");
                self.report_fatal(ConsumerError::Subscribe {
                    topic: self.topic.clone(),
                    source,
                });
                return;
            }
        };
        info!(topic = %self.topic, "Consumer listening");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                delivery = subscription.receive() => match delivery {
                    Some(delivery) => self.dispatch(delivery),
                    None => {
                        error!(topic = %self.topic, "Subscription ended unexpectedly");
                        self.report_fatal(ConsumerError::SubscriptionClosed {
                            topic: self.topic.clone(),
                        });
                        break;
                    }
                },
            }
        }

        if let Err(e) = subscription.close().await {
            warn!(topic = %self.topic, error = %e, "Failed to close subscription");
        }
        self.tasks.close();
        self.tasks.wait().await;
        // Resolve pending `err()` callers with `None`.
        drop(self.take_fatal_sender());
        info!(topic = %self.topic, "Consumer stopped");
    }

    /// Request the receive loop to stop. Idempotent, and prompt even while
    /// the transport is idle.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Wait for a fatal error.
    ///
    /// Resolves with the error at most once, or with `None` once the loop has
    /// exited without one. After that it never resolves again.
    pub async fn err(&self) -> Option<ConsumerError> {
        let mut slot = self.fatal_rx.lock().await;
        match slot.as_mut() {
            Some(receiver) => {
                let outcome = receiver.await.ok();
                *slot = None;
                outcome
            }
            None => {
                drop(slot);
                std::future::pending().await
            }
        }
    }

    fn report_fatal(&self, error: ConsumerError) {
        if let Some(sender) = self.take_fatal_sender() {
            let _ = sender.send(error);
        }
    }

    fn take_fatal_sender(&self) -> Option<oneshot::Sender<ConsumerError>> {
        self.fatal_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn dispatch(&self, delivery: Delivery) {
        ConsumerStats::incr(&self.stats.payloads_received);

        let payload = match Payload::decode(&delivery.payload) {
            Ok(payload) => payload,
            Err(e) => {
                ConsumerStats::incr(&self.stats.payloads_rejected);
                self.observer
                    .on_payload_rejected(&delivery.topic, &e.to_string());
                return;
            }
        };

        let plan = self.plan(&payload);
        if plan.is_empty() {
            return;
        }

        let saga_id = payload.saga_id;
        let observer = self.observer.clone();
        let stats = self.stats.clone();
        self.tasks.spawn(async move {
            for (step, handler, message) in plan {
                compensate(
                    &saga_id,
                    &step,
                    handler.as_ref(),
                    message,
                    observer.as_ref(),
                    &stats,
                )
                .await;
            }
        });
    }

    /// Pair each compensation entry with its handler, skipping unregistered steps.
    fn plan(&self, payload: &Payload) -> Vec<(String, Arc<dyn CompensationHandler>, Message)> {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        payload
            .compensations()
            .filter_map(|entry| match handlers.get(entry.origin.as_str()) {
                Some(handler) => {
                    let message = entry
                        .message
                        .clone()
                        .unwrap_or_default()
                        .stamped(&payload.saga_id);
                    Some((entry.origin.clone(), handler.clone(), message))
                }
                None => {
                    ConsumerStats::incr(&self.stats.compensations_skipped);
                    self.observer
                        .on_compensation_skipped(&payload.saga_id, &entry.origin);
                    None
                }
            })
            .collect()
    }
}

async fn compensate(
    saga_id: &SagaId,
    step: &str,
    handler: &dyn CompensationHandler,
    message: Message,
    observer: &dyn SagaObserver,
    stats: &ConsumerStats,
) {
    ConsumerStats::incr(&stats.compensations_dispatched);
    observer.on_compensation_started(saga_id, step);
    match handler.compensate(message).await {
        Ok(()) => {
            ConsumerStats::incr(&stats.compensations_completed);
            observer.on_compensation_completed(saga_id, step);
        }
        Err(e) => {
            ConsumerStats::incr(&stats.compensations_failed);
            observer.on_compensation_failed(saga_id, step, e.reason(), e.is_ambiguous());
        }
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("topic", &self.topic)
            .field("stopped", &self.shutdown.is_cancelled())
            .finish()
    }
}
