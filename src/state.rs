//! Canonical state names written into the saga log
//!
//! Saga-level states are fixed literals. Per-step states wrap the step name as
//! `STATE_<step>_<SUFFIX>`. These strings are the wire protocol shared with
//! every consumer, so they must not change.

/// First entry of every saga log
pub const SAGA_BEGIN: &str = "SAGA_BEGIN";
/// Last entry of every saga log
pub const SAGA_END: &str = "SAGA_END";
/// Saga function returned successfully
pub const SAGA_SUCCESS: &str = "SAGA_SUCCESS";
/// Saga function returned an error
pub const SAGA_FAILED: &str = "SAGA_FAILED";

const STEP_PREFIX: &str = "STATE_";
const BEGIN_SUFFIX: &str = "_BEGIN";
const SUCCESS_SUFFIX: &str = "_SUCCESS";
const FAILED_SUFFIX: &str = "_FAILED";
const COMPENSATE_SUFFIX: &str = "_COMPENSATE";

/// `STATE_<step>_BEGIN`
pub fn step_begin(step: &str) -> String {
    format!("{STEP_PREFIX}{step}{BEGIN_SUFFIX}")
}

/// `STATE_<step>_SUCCESS`
pub fn step_success(step: &str) -> String {
    format!("{STEP_PREFIX}{step}{SUCCESS_SUFFIX}")
}

/// `STATE_<step>_FAILED`
pub fn step_failed(step: &str) -> String {
    format!("{STEP_PREFIX}{step}{FAILED_SUFFIX}")
}

/// `STATE_<step>_COMPENSATE`
pub fn step_compensate(step: &str) -> String {
    format!("{STEP_PREFIX}{step}{COMPENSATE_SUFFIX}")
}

/// Classified state string.
///
/// Step variants borrow the step name out of the parsed string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateKind<'a> {
    /// `SAGA_BEGIN`
    SagaBegin,
    /// `SAGA_END`
    SagaEnd,
    /// `SAGA_SUCCESS`
    SagaSuccess,
    /// `SAGA_FAILED`
    SagaFailed,
    /// `STATE_<step>_BEGIN`
    StepBegin(&'a str),
    /// `STATE_<step>_SUCCESS`
    StepSuccess(&'a str),
    /// `STATE_<step>_FAILED`
    StepFailed(&'a str),
    /// `STATE_<step>_COMPENSATE`
    StepCompensate(&'a str),
}

impl<'a> StateKind<'a> {
    /// Classify a state string, `None` if it follows neither format.
    pub fn parse(state: &'a str) -> Option<Self> {
        match state {
            SAGA_BEGIN => return Some(Self::SagaBegin),
            SAGA_END => return Some(Self::SagaEnd),
            SAGA_SUCCESS => return Some(Self::SagaSuccess),
            SAGA_FAILED => return Some(Self::SagaFailed),
            _ => {}
        }

        let rest = state.strip_prefix(STEP_PREFIX)?;
        if let Some(step) = rest.strip_suffix(COMPENSATE_SUFFIX) {
            Some(Self::StepCompensate(step))
        } else if let Some(step) = rest.strip_suffix(SUCCESS_SUFFIX) {
            Some(Self::StepSuccess(step))
        } else if let Some(step) = rest.strip_suffix(FAILED_SUFFIX) {
            Some(Self::StepFailed(step))
        } else {
            rest.strip_suffix(BEGIN_SUFFIX).map(Self::StepBegin)
        }
    }

    /// Step name for per-step states
    pub fn step(&self) -> Option<&'a str> {
        match *self {
            Self::StepBegin(step)
            | Self::StepSuccess(step)
            | Self::StepFailed(step)
            | Self::StepCompensate(step) => Some(step),
            _ => None,
        }
    }

    /// True for saga-level states
    pub fn is_saga_level(&self) -> bool {
        self.step().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_step_states() {
        assert_eq!(step_begin("state_transaction_1"), "STATE_state_transaction_1_BEGIN");
        assert_eq!(step_success("tx"), "STATE_tx_SUCCESS");
        assert_eq!(step_failed("tx"), "STATE_tx_FAILED");
        assert_eq!(step_compensate("tx"), "STATE_tx_COMPENSATE");
    }

    #[test]
    fn parses_saga_level_states() {
        assert_eq!(StateKind::parse("SAGA_BEGIN"), Some(StateKind::SagaBegin));
        assert_eq!(StateKind::parse("SAGA_END"), Some(StateKind::SagaEnd));
        assert!(StateKind::parse(SAGA_FAILED).is_some_and(|k| k.is_saga_level()));
    }

    #[test]
    fn parses_step_names_containing_suffix_words() {
        let state = step_compensate("charge_FAILED_card");
        assert_eq!(
            StateKind::parse(&state),
            Some(StateKind::StepCompensate("charge_FAILED_card"))
        );

        let state = step_begin("reserve");
        assert_eq!(StateKind::parse(&state).and_then(|k| k.step()), Some("reserve"));
    }

    #[test]
    fn rejects_unknown_states() {
        assert_eq!(StateKind::parse("STATE_tx_DONE"), None);
        assert_eq!(StateKind::parse("whatever"), None);
    }
}
