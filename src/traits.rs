//! Compensation handler trait

use crate::{CompensationError, Message};
use async_trait::async_trait;
use std::future::Future;

/// Remote undo logic for one step.
///
/// Registered on a [`Consumer`](crate::Consumer) under the step name. The
/// handler receives the compensation entry's message: the step's original
/// input in `data`, stamped with the saga ID.
///
/// Delivery is at-least-once, so handlers should be idempotent.
///
/// # Example
///
/// ```rust,ignore
/// consumer.register_compensation("reserve_stock", |message: Message| async move {
///     inventory.release(&message.data).await.map_err(CompensationError::failed)
/// });
/// ```
#[async_trait]
pub trait CompensationHandler: Send + Sync + 'static {
    /// Undo the step described by `message`
    async fn compensate(&self, message: Message) -> Result<(), CompensationError>;
}

#[async_trait]
impl<F, Fut> CompensationHandler for F
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CompensationError>> + Send + 'static,
{
    async fn compensate(&self, message: Message) -> Result<(), CompensationError> {
        (self)(message).await
    }
}
