//! Saga log model
//!
//! A [`Payload`] is the complete, self-contained history of one saga run. It is
//! what the engine publishes and what consumers decode. Field names and
//! omission rules are the wire contract:
//!
//! ```json
//! {"saga_id":"123456","logs":[
//!   {"state":"SAGA_BEGIN","origin":""},
//!   {"state":"STATE_tx_1_COMPENSATE","origin":"tx_1","message":{"data":"message"},"is_compensation":true}
//! ]}
//! ```

use crate::state::{self, StateKind};
use crate::{CodecError, SagaId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message carried by a log entry.
///
/// `saga_id` is left empty by the producer and stamped by the consumer just
/// before a handler runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Saga the message belongs to; stamped by the consumer
    #[serde(default, skip_serializing_if = "SagaId::is_empty")]
    pub saga_id: SagaId,
    /// Step input, or null
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    /// Failure description, empty when none
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Message {
    /// Message carrying step input
    pub fn with_data(data: Value) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Message carrying a failure description
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }

    /// Copy of this message addressed to `saga_id`
    pub fn stamped(&self, saga_id: &SagaId) -> Self {
        Self {
            saga_id: saga_id.clone(),
            ..self.clone()
        }
    }
}

/// One recorded event of a saga.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// State name, see [`crate::state`]
    pub state: String,
    /// Raw step name this entry refers to, empty for saga-level entries
    #[serde(default)]
    pub origin: String,
    /// Step input for compensations, error text for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Marks entries consumers must act on
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_compensation: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LogEntry {
    pub(crate) fn saga(state: &str) -> Self {
        Self {
            state: state.to_owned(),
            origin: String::new(),
            message: None,
            is_compensation: false,
        }
    }

    pub(crate) fn saga_failed(error: String) -> Self {
        Self {
            message: Some(Message::with_error(error)),
            ..Self::saga(state::SAGA_FAILED)
        }
    }

    pub(crate) fn step(state: String) -> Self {
        Self {
            state,
            origin: String::new(),
            message: None,
            is_compensation: false,
        }
    }

    pub(crate) fn step_failed(step: &str, error: String) -> Self {
        Self {
            message: Some(Message::with_error(error)),
            ..Self::step(state::step_failed(step))
        }
    }

    pub(crate) fn compensation(record: &TransactionRecord) -> Self {
        Self {
            state: state::step_compensate(&record.state),
            origin: record.state.clone(),
            message: Some(Message::with_data(record.data.clone())),
            is_compensation: true,
        }
    }

    /// Classify this entry's state string
    pub fn kind(&self) -> Option<StateKind<'_>> {
        StateKind::parse(&self.state)
    }
}

/// Bookkeeping of one entered step, kept only to synthesize compensations.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRecord {
    /// Step name
    pub state: String,
    /// Input passed to the step
    pub data: Value,
}

/// Overall result recorded in a payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SagaOutcome {
    /// `SAGA_SUCCESS` recorded
    Succeeded,
    /// `SAGA_FAILED` recorded
    Failed,
    /// No terminal saga state has been appended yet
    InProgress,
}

/// Unit published to the transport: the saga ID and its ordered log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Saga the log belongs to
    #[serde(alias = "SagaID", default)]
    pub saga_id: SagaId,
    /// Entries in append order
    #[serde(alias = "Logs", default, deserialize_with = "nullable_logs")]
    pub logs: Vec<LogEntry>,
}

// Producers that never appended a log serialize the list as `null`.
fn nullable_logs<'de, D>(deserializer: D) -> Result<Vec<LogEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<LogEntry>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Payload {
    /// Serialize to the JSON wire format
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// Parse the JSON wire format
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Decode)
    }

    /// Compensation entries in log order
    pub fn compensations(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter().filter(|entry| entry.is_compensation)
    }

    /// Error text of the `SAGA_FAILED` entry, if the saga failed
    pub fn failure(&self) -> Option<&str> {
        self.logs
            .iter()
            .find(|entry| entry.state == state::SAGA_FAILED)
            .map(|entry| entry.message.as_ref().map_or("", |m| m.error.as_str()))
    }

    /// Terminal result recorded in the log
    pub fn outcome(&self) -> SagaOutcome {
        self.logs
            .iter()
            .rev()
            .find_map(|entry| match entry.state.as_str() {
                state::SAGA_SUCCESS => Some(SagaOutcome::Succeeded),
                state::SAGA_FAILED => Some(SagaOutcome::Failed),
                _ => None,
            })
            .unwrap_or(SagaOutcome::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failed_payload() -> Payload {
        let record = TransactionRecord {
            state: "state_transaction_1".into(),
            data: json!("message"),
        };
        Payload {
            saga_id: "123456".into(),
            logs: vec![
                LogEntry::saga(state::SAGA_BEGIN),
                LogEntry::step(state::step_begin("state_transaction_1")),
                LogEntry::step(state::step_success("state_transaction_1")),
                LogEntry::step(state::step_begin("state_transaction_2")),
                LogEntry::step_failed("state_transaction_2", "error in tx 2".into()),
                LogEntry::compensation(&record),
                LogEntry::saga_failed("error in tx 2".into()),
                LogEntry::saga(state::SAGA_END),
            ],
        }
    }

    #[test]
    fn omits_empty_fields_on_the_wire() {
        let entry = LogEntry::saga(state::SAGA_BEGIN);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"state": "SAGA_BEGIN", "origin": ""})
        );

        let record = TransactionRecord {
            state: "tx".into(),
            data: json!({"amount": 10}),
        };
        assert_eq!(
            serde_json::to_value(LogEntry::compensation(&record)).unwrap(),
            json!({
                "state": "STATE_tx_COMPENSATE",
                "origin": "tx",
                "message": {"data": {"amount": 10}},
                "is_compensation": true
            })
        );
    }

    #[test]
    fn payload_survives_encoding() {
        let payload = failed_payload();
        let decoded = Payload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.compensations().count(), 1);
    }

    #[test]
    fn decodes_legacy_field_names() {
        let raw = br#"{"SagaID":"42","Logs":[{"state":"SAGA_BEGIN","origin":""},
            {"state":"STATE_a_COMPENSATE","origin":"a","message":{"data":"x"},"is_compensation":true}]}"#;
        let payload = Payload::decode(raw).unwrap();
        assert_eq!(payload.saga_id.as_str(), "42");
        assert_eq!(payload.logs.len(), 2);
        assert_eq!(payload.logs[1].message, Some(Message::with_data(json!("x"))));

        let empty = Payload::decode(br#"{"SagaID":"7","Logs":null}"#).unwrap();
        assert!(empty.logs.is_empty());
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            Payload::decode(b"not json"),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn reports_outcome_and_failure() {
        let payload = failed_payload();
        assert_eq!(payload.outcome(), SagaOutcome::Failed);
        assert_eq!(payload.failure(), Some("error in tx 2"));
        assert_eq!(Payload::default().outcome(), SagaOutcome::InProgress);
    }

    #[test]
    fn stamping_keeps_data() {
        let stamped = Message::with_data(json!(1)).stamped(&"s".into());
        assert_eq!(stamped.saga_id.as_str(), "s");
        assert_eq!(stamped.data, json!(1));
    }
}
