//! Saga execution engine
//!
//! A [`Saga`] runs forward steps on the caller's task and records every
//! transition in an append-only log. The first failing step aborts the saga
//! and appends one compensation entry per previously entered step, newest
//! first. Compensation is never executed here: once the saga function returns,
//! the whole log is published in the background for remote consumers to act on.

use crate::events::{LogEntry, Payload, TransactionRecord};
use crate::observer::SagaObserver;
use crate::state;
use crate::transport::{PublishAck, Transport};
use crate::{PublishError, SagaContext, SagaId};
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

type PublishTask = JoinHandle<Result<PublishAck, PublishError>>;

/// One saga instance, created by [`Producer::new_saga`](crate::Producer::new_saga).
///
/// Cloning yields another handle to the same saga, which is how the saga
/// function reaches [`Saga::transact`]:
///
/// ```rust,ignore
/// let saga = producer.new_saga("123456");
/// let tx = saga.clone();
/// saga.execute(&SagaContext::new(), |ctx| async move {
///     tx.transact(&ctx, "reserve_stock", json!({"sku": 7}), |_| reserve(7)).await?;
///     tx.transact(&ctx, "charge_card", json!(1200), |_| charge(1200)).await
/// })
/// .await?;
/// ```
#[derive(Clone)]
pub struct Saga {
    inner: Arc<SagaInner>,
}

struct SagaInner {
    id: SagaId,
    topic: Arc<str>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn SagaObserver>,
    log: Mutex<SagaLog>,
    publication: Mutex<Option<PublishTask>>,
}

#[derive(Default)]
struct SagaLog {
    started: bool,
    aborted: bool,
    entries: Vec<LogEntry>,
    transactions: Vec<TransactionRecord>,
}

impl SagaLog {
    fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    /// Record the failure of the step entered at `index`, abort, and append
    /// compensations for the steps entered before it, newest first. Returns
    /// the compensated step names in log order.
    fn fail_step(&mut self, step: &str, index: usize, error: String) -> Vec<String> {
        self.push(LogEntry::step_failed(step, error));
        self.aborted = true;

        let earlier = index.min(self.transactions.len());
        let compensations: Vec<LogEntry> = self.transactions[..earlier]
            .iter()
            .rev()
            .map(LogEntry::compensation)
            .collect();
        let steps = compensations.iter().map(|e| e.origin.clone()).collect();
        self.entries.extend(compensations);
        steps
    }
}

impl Saga {
    pub(crate) fn new(
        id: SagaId,
        topic: Arc<str>,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn SagaObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(SagaInner {
                id,
                topic,
                transport,
                observer,
                log: Mutex::new(SagaLog::default()),
                publication: Mutex::new(None),
            }),
        }
    }

    /// Caller-supplied saga ID
    pub fn id(&self) -> &SagaId {
        &self.inner.id
    }

    /// Run the saga function.
    ///
    /// Appends `SAGA_BEGIN`, runs `saga_fn`, then appends `SAGA_FAILED` (with
    /// the error text) or `SAGA_SUCCESS`, and always `SAGA_END`. The log is then
    /// published on a detached task; use [`Saga::published`] to wait for it.
    /// The saga function's error is returned unchanged.
    ///
    /// A saga runs once. Calling `execute` again logs a warning and returns
    /// `Ok(())` without running `saga_fn`.
    pub async fn execute<F, Fut, E>(&self, ctx: &SagaContext, saga_fn: F) -> Result<(), E>
    where
        F: FnOnce(SagaContext) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        {
            let mut log = self.lock_log();
            if log.started {
                tracing::warn!(saga_id = %self.inner.id, "Saga already executed, ignoring");
                return Ok(());
            }
            log.started = true;
            log.push(LogEntry::saga(state::SAGA_BEGIN));
        }
        self.inner.observer.on_saga_started(&self.inner.id);

        let result = saga_fn(ctx.for_saga(&self.inner.id)).await;

        {
            let mut log = self.lock_log();
            match &result {
                Ok(()) => log.push(LogEntry::saga(state::SAGA_SUCCESS)),
                Err(error) => {
                    log.push(LogEntry::saga_failed(error.to_string()));
                    log.aborted = true;
                }
            }
            log.push(LogEntry::saga(state::SAGA_END));
        }
        match &result {
            Ok(()) => self.inner.observer.on_saga_completed(&self.inner.id),
            Err(error) => self
                .inner
                .observer
                .on_saga_failed(&self.inner.id, &error.to_string()),
        }

        self.spawn_publish();
        result
    }

    /// Run one step.
    ///
    /// No-op returning `Ok(())` once the saga has aborted. Otherwise appends
    /// `STATE_<step>_BEGIN`, records `input` for compensation and runs
    /// `step_fn`. On success appends `STATE_<step>_SUCCESS`. On failure appends
    /// `STATE_<step>_FAILED`, aborts the saga and appends compensation entries
    /// for every earlier step in reverse order; the failing step itself is not
    /// compensated. The step's error is returned unchanged.
    pub async fn transact<F, Fut, E>(
        &self,
        ctx: &SagaContext,
        step: &str,
        input: impl Into<Value>,
        step_fn: F,
    ) -> Result<(), E>
    where
        F: FnOnce(SagaContext) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        let index = {
            let mut log = self.lock_log();
            if log.aborted {
                tracing::debug!(saga_id = %self.inner.id, step = %step, "Saga aborted, step skipped");
                return Ok(());
            }
            log.push(LogEntry::step(state::step_begin(step)));
            log.transactions.push(TransactionRecord {
                state: step.to_owned(),
                data: input.into(),
            });
            log.transactions.len() - 1
        };
        self.inner.observer.on_step_started(&self.inner.id, step);

        let result = step_fn(ctx.clone()).await;

        match &result {
            Ok(()) => {
                self.lock_log()
                    .push(LogEntry::step(state::step_success(step)));
                self.inner.observer.on_step_completed(&self.inner.id, step);
            }
            Err(error) => {
                let error = error.to_string();
                let compensated = self.lock_log().fail_step(step, index, error.clone());
                self.inner
                    .observer
                    .on_step_failed(&self.inner.id, step, &error);
                if !compensated.is_empty() {
                    let steps: Vec<&str> = compensated.iter().map(String::as_str).collect();
                    self.inner
                        .observer
                        .on_compensation_logged(&self.inner.id, &steps);
                }
            }
        }
        result
    }

    /// Snapshot of the saga ID and the log so far
    pub fn payload(&self) -> Payload {
        Payload {
            saga_id: self.inner.id.clone(),
            logs: self.lock_log().entries.clone(),
        }
    }

    /// Steps entered so far, in call order
    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.lock_log().transactions.clone()
    }

    /// True once a step or the saga function has failed
    pub fn is_aborted(&self) -> bool {
        self.lock_log().aborted
    }

    /// Wait for the background publication started by [`Saga::execute`].
    ///
    /// `None` if the saga has not finished executing or the result was
    /// already taken by an earlier call.
    pub async fn published(&self) -> Option<Result<PublishAck, PublishError>> {
        let task = self
            .inner
            .publication
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(match task.await {
            Ok(result) => result,
            Err(join_error) => Err(PublishError::Aborted(join_error.to_string().into())),
        })
    }

    fn spawn_publish(&self) {
        let payload = self.payload();
        let topic = self.inner.topic.clone();
        let transport = self.inner.transport.clone();
        let observer = self.inner.observer.clone();

        let task = tokio::spawn(async move {
            let result = publish(&payload, &topic, transport.as_ref()).await;
            match &result {
                Ok(ack) => observer.on_payload_published(&payload.saga_id, &topic, ack.receivers),
                Err(error) => {
                    observer.on_publish_failed(&payload.saga_id, &topic, &error.to_string())
                }
            }
            result
        });

        *self
            .inner
            .publication
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    fn lock_log(&self) -> MutexGuard<'_, SagaLog> {
        self.inner.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn publish(
    payload: &Payload,
    topic: &str,
    transport: &dyn Transport,
) -> Result<PublishAck, PublishError> {
    let bytes = payload.encode()?;
    transport
        .publish(topic, bytes)
        .await
        .map_err(|source| PublishError::Transport {
            topic: topic.into(),
            source,
        })
}

impl std::fmt::Debug for Saga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Saga")
            .field("id", &self.inner.id)
            .field("topic", &self.inner.topic)
            .finish()
    }
}
