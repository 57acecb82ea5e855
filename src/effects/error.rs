//! Errors raised by the state machine.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use thiserror::Error;

/// Error type hooks may fail with.
///
/// A hook that fails with a [`StateMachineError`] (for example by using `?`
/// on [`State::trigger_internal`](crate::State::trigger_internal)) has that
/// error propagated unchanged. Any other error is reported as
/// [`ErrorKind::HookFailed`].
pub type HookError = Box<dyn StdError + Send + Sync>;

/// Broad class of a [`StateMachineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Caller misuse while setting the machine up
    Configuration,
    /// Operation invalid for the machine's current phase
    Lifecycle,
    /// No transition matches a trigger
    Transition,
    /// A caller-supplied hook failed
    Hook,
}

/// What went wrong.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AlreadyStarted,
    NoStatesDefined,
    StartStateNotMember,
    NotStarted,
    Completed,
    Busy,
    AlreadyInState,
    InvalidTransition,
    StateExists,
    TransitionExists,
    CannotModifyAfterStart,
    /// A state or transition target belongs to a different machine
    ForeignState,
    /// A transition target was never added to the machine
    UnregisteredState,
    HookFailed,
}

impl ErrorKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::NoStatesDefined
            | Self::StateExists
            | Self::TransitionExists
            | Self::StartStateNotMember
            | Self::CannotModifyAfterStart
            | Self::ForeignState
            | Self::UnregisteredState => ErrorCategory::Configuration,
            Self::AlreadyStarted
            | Self::NotStarted
            | Self::Completed
            | Self::Busy
            | Self::AlreadyInState => ErrorCategory::Lifecycle,
            Self::InvalidTransition => ErrorCategory::Transition,
            Self::HookFailed => ErrorCategory::Hook,
        }
    }
}

/// Error raised by a state machine operation.
///
/// Carries the machine name, a human readable message and, where relevant,
/// the offending state name and trigger id.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("State Machine ({machine}) - {message}")]
pub struct StateMachineError {
    pub machine: String,
    pub kind: ErrorKind,
    pub message: String,
    pub state: Option<String>,
    pub trigger: Option<String>,
}

impl StateMachineError {
    pub(crate) fn new(machine: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            machine: machine.to_string(),
            kind,
            message: message.into(),
            state: None,
            trigger: None,
        }
    }

    pub(crate) fn with_state(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }

    pub(crate) fn with_trigger(mut self, trigger: &str) -> Self {
        self.trigger = Some(trigger.to_string());
        self
    }

    pub(crate) fn already_started(machine: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::AlreadyStarted,
            "The state machine has already started.",
        )
    }

    pub(crate) fn no_states_defined(machine: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::NoStatesDefined,
            "No states have been defined. The state machine cannot be started.",
        )
    }

    pub(crate) fn start_state_not_member(machine: &str, state: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::StartStateNotMember,
            format!("Start state ({state}) is not part of this machine."),
        )
        .with_state(state)
    }

    pub(crate) fn not_started(machine: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::NotStarted,
            "Not started. Call start() before trigger().",
        )
    }

    pub(crate) fn completed(machine: &str, state: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::Completed,
            format!("Completed in state: {state}. Call reset() before trigger()."),
        )
        .with_state(state)
    }

    pub(crate) fn busy(machine: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::Busy,
            "Busy. A transition is already in progress.",
        )
    }

    pub(crate) fn already_in_state(machine: &str, state: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::AlreadyInState,
            format!("Already in state: currentState: {state}."),
        )
        .with_state(state)
    }

    pub(crate) fn invalid_transition(machine: &str, state: &str, trigger: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::InvalidTransition,
            format!("Invalid Transition - triggerId: {trigger}."),
        )
        .with_state(state)
        .with_trigger(trigger)
    }

    pub(crate) fn state_exists(machine: &str, state_id: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::StateExists,
            format!("State exists: {state_id}."),
        )
        .with_state(state_id)
    }

    pub(crate) fn transition_exists(machine: &str, trigger: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::TransitionExists,
            format!("Transition exists: {trigger}."),
        )
        .with_trigger(trigger)
    }

    pub(crate) fn cannot_modify_after_start(machine: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::CannotModifyAfterStart,
            "The state machine has started and can no longer be modified.",
        )
    }

    pub(crate) fn foreign_state(machine: &str, state: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::ForeignState,
            format!("State ({state}) belongs to a different machine."),
        )
        .with_state(state)
    }

    pub(crate) fn unregistered_state(machine: &str, state: &str) -> Self {
        Self::new(
            machine,
            ErrorKind::UnregisteredState,
            format!("State ({state}) has not been added to this machine."),
        )
        .with_state(state)
    }

    /// Convert a hook failure into a machine error.
    pub(crate) fn from_hook(machine: &str, state: &str, error: HookError) -> Self {
        match error.downcast::<StateMachineError>() {
            Ok(inner) => *inner,
            Err(other) => Self::new(
                machine,
                ErrorKind::HookFailed,
                format!("Hook failed in state {state}: {other}"),
            )
            .with_state(state),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}
