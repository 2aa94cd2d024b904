//! Test helpers

use crate::{CompensationError, CompensationHandler, Message};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Install a `fmt` subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Compensation handler that forwards every message it receives, tagged
/// with its label, to a channel.
#[derive(Clone)]
pub struct RecordingHandler {
    label: Box<str>,
    sender: mpsc::UnboundedSender<(Box<str>, Message)>,
    fail_with: Option<CompensationError>,
}

impl RecordingHandler {
    /// Handler labelled `label` and the receiver of its calls
    pub fn new(label: &str) -> (Self, mpsc::UnboundedReceiver<(Box<str>, Message)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = Self {
            label: label.into(),
            sender,
            fail_with: None,
        };
        (handler, receiver)
    }

    /// Another handler reporting to the same channel
    pub fn sibling(&self, label: &str) -> Self {
        Self {
            label: label.into(),
            sender: self.sender.clone(),
            fail_with: None,
        }
    }

    /// Record the message, then fail with `error`
    pub fn failing(mut self, error: CompensationError) -> Self {
        self.fail_with = Some(error);
        self
    }
}

#[async_trait]
impl CompensationHandler for RecordingHandler {
    async fn compensate(&self, message: Message) -> Result<(), CompensationError> {
        let _ = self.sender.send((self.label.clone(), message));
        match &self.fail_with {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
