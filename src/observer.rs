//! Saga observer trait

use crate::SagaId;

/// Observer for saga lifecycle, publication and compensation dispatch.
///
/// Producer-side callbacks run on the caller's task (or the publish task for
/// the publication callbacks). Consumer-side callbacks run on the receive loop
/// or a dispatch task.
pub trait SagaObserver: Send + Sync + 'static {
    /// Saga function is about to run
    fn on_saga_started(&self, saga_id: &SagaId);
    /// Step entered
    fn on_step_started(&self, saga_id: &SagaId, step: &str);
    /// Step returned `Ok`
    fn on_step_completed(&self, saga_id: &SagaId, step: &str);
    /// Step returned an error and aborted the saga
    fn on_step_failed(&self, saga_id: &SagaId, step: &str, error: &str);
    /// Compensation entries appended, newest step first
    fn on_compensation_logged(&self, saga_id: &SagaId, steps: &[&str]);
    /// Saga function returned `Ok`
    fn on_saga_completed(&self, saga_id: &SagaId);
    /// Saga function returned an error
    fn on_saga_failed(&self, saga_id: &SagaId, reason: &str);
    /// Final log handed to the transport
    fn on_payload_published(&self, saga_id: &SagaId, topic: &str, receivers: u64);
    /// Final log could not be encoded or published
    fn on_publish_failed(&self, saga_id: &SagaId, topic: &str, error: &str);
    /// Delivery did not decode as a payload
    fn on_payload_rejected(&self, topic: &str, error: &str);
    /// Handler about to run
    fn on_compensation_started(&self, saga_id: &SagaId, step: &str);
    /// Handler returned `Ok`
    fn on_compensation_completed(&self, saga_id: &SagaId, step: &str);
    /// No handler registered for the entry's origin
    fn on_compensation_skipped(&self, saga_id: &SagaId, step: &str);
    /// Handler returned an error
    fn on_compensation_failed(&self, saga_id: &SagaId, step: &str, error: &str, is_ambiguous: bool);
}

/// No-op observer
pub struct NoOpObserver;

impl SagaObserver for NoOpObserver {
    fn on_saga_started(&self, _saga_id: &SagaId) {}
    fn on_step_started(&self, _saga_id: &SagaId, _step: &str) {}
    fn on_step_completed(&self, _saga_id: &SagaId, _step: &str) {}
    fn on_step_failed(&self, _saga_id: &SagaId, _step: &str, _error: &str) {}
    fn on_compensation_logged(&self, _saga_id: &SagaId, _steps: &[&str]) {}
    fn on_saga_completed(&self, _saga_id: &SagaId) {}
    fn on_saga_failed(&self, _saga_id: &SagaId, _reason: &str) {}
    fn on_payload_published(&self, _saga_id: &SagaId, _topic: &str, _receivers: u64) {}
    fn on_publish_failed(&self, _saga_id: &SagaId, _topic: &str, _error: &str) {}
    fn on_payload_rejected(&self, _topic: &str, _error: &str) {}
    fn on_compensation_started(&self, _saga_id: &SagaId, _step: &str) {}
    fn on_compensation_completed(&self, _saga_id: &SagaId, _step: &str) {}
    fn on_compensation_skipped(&self, _saga_id: &SagaId, _step: &str) {}
    fn on_compensation_failed(&self, _saga_id: &SagaId, _step: &str, _error: &str, _is_ambiguous: bool) {}
}

/// Tracing-based observer
pub struct TracingObserver;

impl SagaObserver for TracingObserver {
    fn on_saga_started(&self, saga_id: &SagaId) {
        tracing::info!(saga_id = %saga_id, "Saga started");
    }

    fn on_step_started(&self, saga_id: &SagaId, step: &str) {
        tracing::debug!(saga_id = %saga_id, step = %step, "Step started");
    }

    fn on_step_completed(&self, saga_id: &SagaId, step: &str) {
        tracing::info!(saga_id = %saga_id, step = %step, "Step completed");
    }

    fn on_step_failed(&self, saga_id: &SagaId, step: &str, error: &str) {
        tracing::warn!(saga_id = %saga_id, step = %step, error = %error, "Step failed");
    }

    fn on_compensation_logged(&self, saga_id: &SagaId, steps: &[&str]) {
        tracing::info!(saga_id = %saga_id, steps = ?steps, "Compensation logged");
    }

    fn on_saga_completed(&self, saga_id: &SagaId) {
        tracing::info!(saga_id = %saga_id, "Saga completed");
    }

    fn on_saga_failed(&self, saga_id: &SagaId, reason: &str) {
        tracing::error!(saga_id = %saga_id, reason = %reason, "Saga failed");
    }

    fn on_payload_published(&self, saga_id: &SagaId, topic: &str, receivers: u64) {
        tracing::debug!(saga_id = %saga_id, topic = %topic, receivers, "Saga log published");
    }

    fn on_publish_failed(&self, saga_id: &SagaId, topic: &str, error: &str) {
        tracing::error!(saga_id = %saga_id, topic = %topic, error = %error, "Saga log publish failed");
    }

    fn on_payload_rejected(&self, topic: &str, error: &str) {
        tracing::warn!(topic = %topic, error = %error, "Malformed saga payload skipped");
    }

    fn on_compensation_started(&self, saga_id: &SagaId, step: &str) {
        tracing::info!(saga_id = %saga_id, step = %step, "Compensation started");
    }

    fn on_compensation_completed(&self, saga_id: &SagaId, step: &str) {
        tracing::info!(saga_id = %saga_id, step = %step, "Compensation completed");
    }

    fn on_compensation_skipped(&self, saga_id: &SagaId, step: &str) {
        tracing::debug!(saga_id = %saga_id, step = %step, "No compensation registered");
    }

    fn on_compensation_failed(&self, saga_id: &SagaId, step: &str, error: &str, is_ambiguous: bool) {
        if is_ambiguous {
            tracing::error!(saga_id = %saga_id, step = %step, error = %error, "Compensation outcome ambiguous");
        } else {
            tracing::warn!(saga_id = %saga_id, step = %step, error = %error, "Compensation failed");
        }
    }
}
