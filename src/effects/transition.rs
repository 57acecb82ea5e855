//! Transition between two states.

use crate::effects::state::{State, StateInner};
use std::fmt;
use std::sync::{Arc, Weak};

/// A trigger id paired with the state it leads to.
///
/// The target is held weakly: a transition never keeps its target alive.
/// Registered states are owned by their machine, so the target of a
/// transition between registered states resolves for as long as the machine
/// exists.
pub struct Transition<C = ()> {
    trigger_id: String,
    target: Weak<StateInner<C>>,
}

impl<C> Transition<C> {
    pub fn new(trigger_id: impl Into<String>, target: &State<C>) -> Self {
        Self {
            trigger_id: trigger_id.into(),
            target: Arc::downgrade(target.inner()),
        }
    }

    /// The trigger key this transition is registered under.
    pub fn trigger_id(&self) -> &str {
        &self.trigger_id
    }

    /// The state entered when this transition fires, or `None` if that
    /// state no longer exists.
    pub fn target_state(&self) -> Option<State<C>> {
        self.target.upgrade().map(State::from_inner)
    }
}

impl<C> Clone for Transition<C> {
    fn clone(&self) -> Self {
        Self {
            trigger_id: self.trigger_id.clone(),
            target: Weak::clone(&self.target),
        }
    }
}

impl<C> fmt::Debug for Transition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("trigger_id", &self.trigger_id)
            .field(
                "target",
                &self.target_state().map(|s| s.id().to_string()),
            )
            .finish()
    }
}
