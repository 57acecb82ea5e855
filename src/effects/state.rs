//! States and their local transitions.

use crate::core::{local_trigger_key, normalize_id};
use crate::effects::action::{EntryAction, ExitAction};
use crate::effects::error::StateMachineError;
use crate::effects::machine::{lock, MachineInner, StateMachine};
use crate::effects::transition::Transition;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

pub(crate) struct StateInner<C> {
    machine: Weak<MachineInner<C>>,
    machine_name: String,
    name: String,
    id: String,
    is_complete: bool,
    hooks: Mutex<Hooks<C>>,
    transitions: Mutex<HashMap<String, Transition<C>>>,
}

struct Hooks<C> {
    entry: Option<EntryAction<C>>,
    exit: Option<ExitAction<C>>,
}

/// A named state of a [`StateMachine`].
///
/// `State` is a cheap handle: clones refer to the same state, and equality
/// is identity. A state only refers back to its machine weakly, so holding a
/// state does not keep the machine alive.
pub struct State<C = ()> {
    inner: Arc<StateInner<C>>,
}

impl<C: Send + Sync + 'static> State<C> {
    /// Create a state associated with `machine`.
    ///
    /// The state still has to be registered with
    /// [`StateMachine::add_state`]; [`StateMachine::create_state`] does both.
    pub fn new(machine: &StateMachine<C>, name: impl Into<String>, is_complete: bool) -> Self {
        let name = name.into();
        Self {
            inner: Arc::new(StateInner {
                machine: machine.downgrade(),
                machine_name: machine.name().to_string(),
                id: normalize_id(&name),
                name,
                is_complete,
                hooks: Mutex::new(Hooks {
                    entry: None,
                    exit: None,
                }),
                transitions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The machine this state belongs to, if it still exists.
    pub fn machine(&self) -> Option<StateMachine<C>> {
        self.inner.machine.upgrade().map(StateMachine::from_inner)
    }

    /// Add a local transition from this state to `target`.
    ///
    /// The transition is stored under `"<state-id>:<normalized-trigger>"`.
    /// `target` must already be added to the machine.
    pub fn add_transition(
        &self,
        trigger_id: &str,
        target: &State<C>,
    ) -> Result<(), StateMachineError> {
        if !Weak::ptr_eq(&self.inner.machine, &target.inner.machine) {
            return Err(StateMachineError::foreign_state(
                &self.inner.machine_name,
                target.name(),
            ));
        }
        let Some(machine) = self.machine() else {
            return Err(StateMachineError::unregistered_state(
                &self.inner.machine_name,
                target.name(),
            ));
        };
        machine.check_transition_target(target)?;

        let key = local_trigger_key(&self.inner.id, trigger_id);
        let mut transitions = lock(&self.inner.transitions);
        if transitions.contains_key(&key) {
            return Err(StateMachineError::transition_exists(
                &self.inner.machine_name,
                &key,
            ));
        }
        debug!("{}: added transition {key} -> {}", self.inner.machine_name, target.id());
        transitions.insert(key.clone(), Transition::new(key, target));
        Ok(())
    }

    /// Look up the local transition for a trigger id.
    pub fn get_transition(&self, trigger_id: &str) -> Option<Transition<C>> {
        self.lookup(&local_trigger_key(&self.inner.id, trigger_id))
    }

    /// Look up a local transition by its full trigger key.
    pub(crate) fn lookup(&self, key: &str) -> Option<Transition<C>> {
        lock(&self.inner.transitions).get(key).cloned()
    }

    /// All local transitions of this state.
    pub fn transitions(&self) -> Vec<Transition<C>> {
        lock(&self.inner.transitions).values().cloned().collect()
    }

    /// Emit a trigger on the owning machine.
    ///
    /// Equivalent to [`StateMachine::trigger`], including the rejection with
    /// `Busy` while a transition is being processed.
    pub async fn trigger(&self, trigger_id: &str) -> Result<(), StateMachineError> {
        self.owning_machine()?.trigger(trigger_id).await
    }

    /// Emit a global trigger on the owning machine.
    pub async fn trigger_global(&self, trigger_id: &str) -> Result<(), StateMachineError> {
        self.owning_machine()?.trigger_global(trigger_id).await
    }

    /// Emit a trigger from inside this state's entry or exit hook.
    ///
    /// Unlike [`State::trigger`] this is never rejected as busy. If the
    /// machine is already processing, the trigger is queued behind the
    /// current one and this call returns as soon as it is queued; the
    /// queued transition runs before the outer `start`/`trigger` resolves.
    pub async fn trigger_internal(&self, trigger_id: &str) -> Result<(), StateMachineError> {
        self.owning_machine()?
            .dispatch(trigger_id, false, true)
            .await
    }

    /// Global variant of [`State::trigger_internal`].
    pub async fn trigger_internal_global(
        &self,
        trigger_id: &str,
    ) -> Result<(), StateMachineError> {
        self.owning_machine()?.dispatch(trigger_id, true, true).await
    }

    /// Replace the entry hook. Fails once the machine has started.
    pub fn set_entry_action(
        &self,
        action: Option<EntryAction<C>>,
    ) -> Result<(), StateMachineError> {
        self.ensure_unstarted()?;
        lock(&self.inner.hooks).entry = action;
        Ok(())
    }

    /// Replace the exit hook. Fails once the machine has started.
    pub fn set_exit_action(
        &self,
        action: Option<ExitAction<C>>,
    ) -> Result<(), StateMachineError> {
        self.ensure_unstarted()?;
        lock(&self.inner.hooks).exit = action;
        Ok(())
    }

    fn ensure_unstarted(&self) -> Result<(), StateMachineError> {
        if self.machine().is_some_and(|m| m.started()) {
            return Err(StateMachineError::cannot_modify_after_start(
                &self.inner.machine_name,
            ));
        }
        Ok(())
    }

    fn owning_machine(&self) -> Result<StateMachine<C>, StateMachineError> {
        self.machine()
            .ok_or_else(|| StateMachineError::not_started(&self.inner.machine_name))
    }
}

impl<C> State<C> {
    pub(crate) fn from_inner(inner: Arc<StateInner<C>>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<StateInner<C>> {
        &self.inner
    }

    pub(crate) fn belongs_to(&self, machine: &Weak<MachineInner<C>>) -> bool {
        Weak::ptr_eq(&self.inner.machine, machine)
    }

    /// Display name given at creation.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Normalized id derived from the name.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Whether entering this state completes the machine.
    pub fn is_complete(&self) -> bool {
        self.inner.is_complete
    }

    pub fn entry_action(&self) -> Option<EntryAction<C>> {
        lock(&self.inner.hooks).entry.clone()
    }

    pub fn exit_action(&self) -> Option<ExitAction<C>> {
        lock(&self.inner.hooks).exit.clone()
    }
}

impl<C> Clone for State<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> PartialEq for State<C> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<C> Eq for State<C> {}

impl<C> fmt::Debug for State<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.inner.name)
            .field("id", &self.inner.id)
            .field("is_complete", &self.inner.is_complete)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::error::ErrorKind;

    #[test]
    fn id_is_normalized_name() {
        let machine = StateMachine::new("m");
        let state = State::new(&machine, "My First State", true);

        assert_eq!(state.name(), "My First State");
        assert_eq!(state.id(), "my-first-state");
        assert!(state.is_complete());
    }

    #[test]
    fn add_transition_stores_local_key() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        let s2 = machine.create_state("s2", false, None, None).unwrap();

        s1.add_transition("Go Next", &s2).unwrap();

        let transition = s1.get_transition("go next").unwrap();
        assert_eq!(transition.trigger_id(), "s-1:go-next");
        assert_eq!(transition.target_state(), Some(s2));
        assert!(s1.lookup("s-1:go-next").is_some());
    }

    #[test]
    fn duplicate_transition_is_rejected() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("first", false, None, None).unwrap();
        let s2 = machine.create_state("second", false, None, None).unwrap();

        s1.add_transition("next", &s2).unwrap();
        let err = s1.add_transition("Next", &s2).unwrap_err();

        assert_eq!(err.kind, ErrorKind::TransitionExists);
        assert_eq!(err.to_string(), "State Machine (m) - Transition exists: first:next.");
    }

    #[test]
    fn transition_to_another_machines_state_is_rejected() {
        let machine = StateMachine::new("m");
        let other = StateMachine::new("other");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        let foreign = other.create_state("foreign", false, None, None).unwrap();

        let err = s1.add_transition("next", &foreign).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ForeignState);
    }

    #[test]
    fn transition_to_unregistered_state_is_rejected() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        let ghost = State::new(&machine, "ghost", false);

        let err = s1.add_transition("next", &ghost).unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnregisteredState);
        assert_eq!(err.state.as_deref(), Some("ghost"));
        assert!(s1.transitions().is_empty());

        machine.add_state(&ghost).unwrap();
        s1.add_transition("next", &ghost).unwrap();
    }

    #[tokio::test]
    async fn hooks_are_fixed_once_started() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        s1.set_exit_action(Some(crate::builder::exit_action(|_state, _ctx| async {
            Ok::<bool, crate::effects::HookError>(false)
        })))
        .unwrap();

        machine.start().await.unwrap();

        let err = s1.set_exit_action(None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CannotModifyAfterStart);
        assert!(s1.exit_action().is_some());

        machine.reset().unwrap();
        s1.set_entry_action(None).unwrap();
    }

    #[test]
    fn missing_transition_is_none() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        assert!(s1.get_transition("nowhere").is_none());
        assert!(s1.transitions().is_empty());
    }

    #[test]
    fn clones_are_equal_but_distinct_states_are_not() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        let twin = State::new(&machine, "s1", false);

        assert_eq!(s1, s1.clone());
        assert_ne!(s1, twin);
    }

    #[test]
    fn state_does_not_keep_machine_alive() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        assert!(s1.machine().is_some());

        drop(machine);
        assert!(s1.machine().is_none());
    }

    #[tokio::test]
    async fn trigger_on_orphaned_state_fails() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        drop(machine);

        let err = s1.trigger("next").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotStarted);
    }
}
