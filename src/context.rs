//! Saga identity and execution context

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-supplied identifier of a saga execution.
///
/// Uniqueness is not enforced; two sagas created with the same ID publish
/// independently to the same topic.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaId(String);

impl SagaId {
    /// Create a new saga ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no ID is present (the producer never stamps message IDs)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SagaId({})", self.0)
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SagaId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for SagaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Cancellable context handed to saga and step functions.
///
/// The engine never inspects the context between steps. Step functions that
/// want to honour cancellation or a deadline must check it themselves.
#[derive(Clone, Default)]
pub struct SagaContext {
    token: CancellationToken,
    deadline: Option<Instant>,
    saga_id: Option<SagaId>,
}

impl SagaContext {
    /// Create a fresh, uncancelled context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context driven by an existing cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    /// Derive a context that is also cancelled once `timeout` elapses
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.clone(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
            saga_id: self.saga_id.clone(),
        }
    }

    /// Derive a child context. Cancelling the child leaves the parent intact.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            saga_id: self.saga_id.clone(),
        }
    }

    pub(crate) fn for_saga(&self, saga_id: &SagaId) -> Self {
        Self {
            saga_id: Some(saga_id.clone()),
            ..self.child()
        }
    }

    /// ID of the saga this context was handed out by, if any
    pub fn saga_id(&self) -> Option<&SagaId> {
        self.saga_id.as_ref()
    }

    /// Deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Request cancellation of this context and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once cancelled or past the deadline
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the context is cancelled or its deadline passes
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl std::fmt::Debug for SagaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SagaContext")
            .field("saga_id", &self.saga_id)
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saga_id_displays_raw_value() {
        let id = SagaId::from("123456");
        assert_eq!(id.to_string(), "123456");
        assert_eq!(format!("{id:?}"), "SagaId(123456)");
        assert!(SagaId::default().is_empty());
    }

    #[test]
    fn cancelling_parent_cancels_child_but_not_the_reverse() {
        let parent = SagaContext::new();
        let child = parent.child();
        child.cancel();
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cancels_context() {
        let ctx = SagaContext::new().with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_cancelled());
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn saga_context_carries_saga_id() {
        let ctx = SagaContext::new().for_saga(&SagaId::from("abc"));
        assert_eq!(ctx.saga_id().map(SagaId::as_str), Some("abc"));
    }
}
