//! State machine that resolves triggers and runs entry/exit hooks.

use crate::builder::StateMachineBuilder;
use crate::core::{bare_trigger, local_trigger_key, normalize_id, StateChange, StateHistory};
use crate::effects::action::{EntryAction, ExitAction};
use crate::effects::error::{HookError, StateMachineError};
use crate::effects::queue::TriggerQueue;
use crate::effects::state::State;
use crate::effects::transition::Transition;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct MachineInner<C> {
    name: String,
    id: String,
    context: Option<Arc<C>>,
    entry_action: Option<EntryAction<C>>,
    exit_action: Option<ExitAction<C>>,
    core: Mutex<MachineCore<C>>,
}

struct MachineCore<C> {
    /// Registered states in registration order
    states: Vec<State<C>>,
    state_index: HashMap<String, usize>,
    transitions: HashMap<String, Transition<C>>,
    start_state: Option<State<C>>,
    current_state: Option<State<C>>,
    previous_state: Option<State<C>>,
    queue: TriggerQueue,
    history: StateHistory,
}

impl<C> MachineCore<C> {
    fn new(history_limit: usize) -> Self {
        Self {
            states: Vec::new(),
            state_index: HashMap::new(),
            transitions: HashMap::new(),
            start_state: None,
            current_state: None,
            previous_state: None,
            queue: TriggerQueue::new(),
            history: StateHistory::with_limit(history_limit),
        }
    }

    fn contains(&self, state: &State<C>) -> bool {
        self.state_index
            .get(state.id())
            .is_some_and(|&i| self.states[i] == *state)
    }
}

/// Point-in-time view of a machine, for logging and diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub name: String,
    pub id: String,
    pub started: bool,
    pub complete: bool,
    pub busy: bool,
    pub start_state: Option<String>,
    pub current_state: Option<String>,
    pub previous_state: Option<String>,
    pub pending_triggers: usize,
    pub states: Vec<String>,
}

/// Finite state machine with hooks and a single-flight trigger queue.
///
/// `StateMachine` is a cheap handle; clones drive the same machine. States
/// and global transitions are registered before [`start`](Self::start).
/// Triggers are then resolved one at a time: while a transition is being
/// processed the machine is busy, external triggers are rejected and
/// triggers raised from hooks are queued behind the current one.
///
/// # Example
///
/// ```rust
/// use fusium::StateMachine;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), fusium::StateMachineError> {
/// let machine = StateMachine::new("door");
/// let closed = machine.create_state("closed", false, None, None)?;
/// let open = machine.create_state("open", false, None, None)?;
/// closed.add_transition("push", &open)?;
///
/// machine.start().await?;
/// machine.trigger("push").await?;
///
/// assert_eq!(machine.current_state(), Some(open));
/// assert_eq!(machine.previous_state(), Some(closed));
/// # Ok(())
/// # }
/// ```
pub struct StateMachine<C = ()> {
    inner: Arc<MachineInner<C>>,
}

impl StateMachine<()> {
    /// Create a machine without a context or machine-level hooks.
    pub fn new(name: impl Into<String>) -> Self {
        StateMachineBuilder::new(name).build()
    }
}

impl<C: Send + Sync + 'static> StateMachine<C> {
    /// Create a machine whose hooks all receive `context`.
    pub fn with_context(name: impl Into<String>, context: C) -> Self {
        StateMachineBuilder::new(name).context(context).build()
    }

    /// Start configuring a machine with a context and machine-level hooks.
    pub fn builder(name: impl Into<String>) -> StateMachineBuilder<C> {
        StateMachineBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        context: Option<Arc<C>>,
        entry_action: Option<EntryAction<C>>,
        exit_action: Option<ExitAction<C>>,
        history_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(MachineInner {
                id: normalize_id(&name),
                name,
                context,
                entry_action,
                exit_action,
                core: Mutex::new(MachineCore::new(history_limit)),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<MachineInner<C>>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<MachineInner<C>> {
        Arc::downgrade(&self.inner)
    }

    fn core(&self) -> MutexGuard<'_, MachineCore<C>> {
        lock(&self.inner.core)
    }

    // ----------------------------------------------------------------------
    // Observers
    // ----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Normalized id derived from the name. Not guaranteed unique.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn context(&self) -> Option<Arc<C>> {
        self.inner.context.clone()
    }

    /// Whether the machine has entered a state since it was created or reset.
    pub fn started(&self) -> bool {
        self.core().current_state.is_some()
    }

    /// Whether the current state is a completed state.
    pub fn is_complete(&self) -> bool {
        self.core()
            .current_state
            .as_ref()
            .is_some_and(State::is_complete)
    }

    /// Whether a trigger is currently being processed.
    pub fn busy(&self) -> bool {
        self.core().queue.is_busy()
    }

    pub fn current_state(&self) -> Option<State<C>> {
        self.core().current_state.clone()
    }

    pub fn previous_state(&self) -> Option<State<C>> {
        self.core().previous_state.clone()
    }

    /// The state the machine was last started in.
    pub fn start_state(&self) -> Option<State<C>> {
        self.core().start_state.clone()
    }

    /// Registered states, in registration order.
    pub fn states(&self) -> Vec<State<C>> {
        self.core().states.clone()
    }

    /// Number of triggers waiting behind the one being processed.
    pub fn pending_triggers(&self) -> usize {
        self.core().queue.len()
    }

    /// Committed state changes since the machine was last started, up to
    /// the configured history limit.
    pub fn history(&self) -> StateHistory {
        self.core().history.clone()
    }

    pub fn get_state_by_id(&self, id: &str) -> Option<State<C>> {
        let core = self.core();
        core.state_index
            .get(&normalize_id(id))
            .map(|&i| core.states[i].clone())
    }

    pub fn global_transition(&self, trigger_id: &str) -> Option<Transition<C>> {
        self.core().transitions.get(&normalize_id(trigger_id)).cloned()
    }

    pub fn status(&self) -> MachineStatus {
        let core = self.core();
        let id_of = |s: &Option<State<C>>| s.as_ref().map(|s| s.id().to_string());
        MachineStatus {
            name: self.inner.name.clone(),
            id: self.inner.id.clone(),
            started: core.current_state.is_some(),
            complete: core.current_state.as_ref().is_some_and(State::is_complete),
            busy: core.queue.is_busy(),
            start_state: id_of(&core.start_state),
            current_state: id_of(&core.current_state),
            previous_state: id_of(&core.previous_state),
            pending_triggers: core.queue.len(),
            states: core.states.iter().map(|s| s.id().to_string()).collect(),
        }
    }

    // ----------------------------------------------------------------------
    // Registration
    // ----------------------------------------------------------------------

    /// Register a state created with [`State::new`].
    pub fn add_state(&self, state: &State<C>) -> Result<(), StateMachineError> {
        if !state.belongs_to(&self.downgrade()) {
            return Err(StateMachineError::foreign_state(self.name(), state.name()));
        }

        let mut core = self.core();
        if core.current_state.is_some() {
            return Err(StateMachineError::cannot_modify_after_start(self.name()));
        }
        if core.state_index.contains_key(state.id()) {
            return Err(StateMachineError::state_exists(self.name(), state.id()));
        }

        let index = core.states.len();
        core.state_index.insert(state.id().to_string(), index);
        core.states.push(state.clone());
        debug!("registered state {} on {}", state.id(), self.inner.name);
        Ok(())
    }

    /// Create a state and register it with this machine.
    pub fn create_state(
        &self,
        name: &str,
        is_complete: bool,
        entry_action: Option<EntryAction<C>>,
        exit_action: Option<ExitAction<C>>,
    ) -> Result<State<C>, StateMachineError> {
        let state = State::new(self, name, is_complete);
        state.set_entry_action(entry_action)?;
        state.set_exit_action(exit_action)?;
        self.add_state(&state)?;
        Ok(state)
    }

    /// Add a transition that applies from any state.
    ///
    /// Global transitions are consulted only when the current state has no
    /// local transition for the trigger.
    pub fn add_global_transition(
        &self,
        trigger_id: &str,
        target: &State<C>,
    ) -> Result<(), StateMachineError> {
        if !target.belongs_to(&self.downgrade()) {
            return Err(StateMachineError::foreign_state(self.name(), target.name()));
        }

        let key = normalize_id(trigger_id);
        let mut core = self.core();
        if core.current_state.is_some() {
            return Err(StateMachineError::cannot_modify_after_start(self.name()));
        }
        if !core.contains(target) {
            return Err(StateMachineError::unregistered_state(self.name(), target.name()));
        }
        if core.transitions.contains_key(&key) {
            return Err(StateMachineError::transition_exists(self.name(), &key));
        }
        core.transitions
            .insert(key.clone(), Transition::new(key, target));
        Ok(())
    }

    /// Check that a local transition to `target` may still be added.
    pub(crate) fn check_transition_target(
        &self,
        target: &State<C>,
    ) -> Result<(), StateMachineError> {
        let core = self.core();
        if core.current_state.is_some() {
            return Err(StateMachineError::cannot_modify_after_start(self.name()));
        }
        if !core.contains(target) {
            return Err(StateMachineError::unregistered_state(self.name(), target.name()));
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Lifecycle
    // ----------------------------------------------------------------------

    /// Start the machine in the first registered state.
    ///
    /// Resolves once the start state has been entered, including any
    /// transitions its entry hooks trigger internally.
    pub async fn start(&self) -> Result<(), StateMachineError> {
        self.start_in(None).await
    }

    /// Start the machine in `state`.
    pub async fn start_at(&self, state: &State<C>) -> Result<(), StateMachineError> {
        self.start_in(Some(state.clone())).await
    }

    async fn start_in(&self, requested: Option<State<C>>) -> Result<(), StateMachineError> {
        let start_state = {
            let mut core = self.core();
            if core.current_state.is_some() {
                return Err(StateMachineError::already_started(self.name()));
            }
            if core.states.is_empty() {
                return Err(StateMachineError::no_states_defined(self.name()));
            }
            let Some(start_state) = requested.or_else(|| core.states.first().cloned()) else {
                return Err(StateMachineError::no_states_defined(self.name()));
            };
            if !core.contains(&start_state) {
                return Err(StateMachineError::start_state_not_member(
                    self.name(),
                    start_state.name(),
                ));
            }
            core.start_state = Some(start_state.clone());
            start_state
        };

        info!("starting {} in state {}", self.inner.name, start_state.id());
        self.change_state(start_state, None).await
    }

    /// Return the machine to its unstarted phase.
    ///
    /// Clears the current and previous state, pending triggers and history.
    /// Fails with `Busy` while a trigger is being processed.
    pub fn reset(&self) -> Result<(), StateMachineError> {
        let mut core = self.core();
        if core.queue.is_busy() {
            return Err(StateMachineError::busy(self.name()));
        }
        core.previous_state = None;
        core.current_state = None;
        core.queue.clear();
        core.history.clear();
        info!("reset {}", self.inner.name);
        Ok(())
    }

    /// Reset the machine and start it again in its original start state.
    pub async fn restart(&self) -> Result<(), StateMachineError> {
        self.reset()?;
        let start_state = self.core().start_state.clone();
        self.start_in(start_state).await
    }

    /// Change back into the previous state, if there is one.
    pub async fn goto_previous(&self) -> Result<(), StateMachineError> {
        let previous = self.core().previous_state.clone();
        match previous {
            Some(previous) => self.change_state(previous, None).await,
            None => Ok(()),
        }
    }

    // ----------------------------------------------------------------------
    // Triggers
    // ----------------------------------------------------------------------

    /// Emit a trigger local to the current state.
    ///
    /// The trigger resolves against the current state's transitions first
    /// and falls back to a global transition with the same id. Fails with
    /// `Busy` if another trigger is being processed.
    pub async fn trigger(&self, trigger_id: &str) -> Result<(), StateMachineError> {
        self.dispatch(trigger_id, false, false).await
    }

    /// Emit a trigger that only resolves against global transitions.
    pub async fn trigger_global(&self, trigger_id: &str) -> Result<(), StateMachineError> {
        self.dispatch(trigger_id, true, false).await
    }

    /// Queue a trigger and, if nobody is processing yet, process the queue.
    pub(crate) async fn dispatch(
        &self,
        trigger_id: &str,
        send_global: bool,
        internal: bool,
    ) -> Result<(), StateMachineError> {
        let processor = {
            let mut core = self.core();
            let Some(current) = core.current_state.clone() else {
                return Err(StateMachineError::not_started(self.name()));
            };
            if current.is_complete() {
                return Err(StateMachineError::completed(self.name(), current.name()));
            }
            if core.queue.is_busy() && !internal {
                return Err(StateMachineError::busy(self.name()));
            }

            let key = if send_global {
                normalize_id(trigger_id)
            } else {
                local_trigger_key(current.id(), trigger_id)
            };
            debug!("queued trigger {key} on {}", self.inner.name);
            core.queue.enqueue(key);
            core.queue.acquire()
        };

        if !processor {
            return Ok(());
        }
        self.drain().await
    }

    async fn drain(&self) -> Result<(), StateMachineError> {
        let mut release = ReleaseOnDrop {
            machine: &self.inner,
            armed: true,
        };
        loop {
            // Seeing the queue empty and going idle is one step; a trigger
            // queued after it finds the machine idle and processes itself.
            let next = self.core().queue.next_or_release();
            let Some(key) = next else {
                release.armed = false;
                return Ok(());
            };
            self.handle_trigger(&key).await?;
        }
    }

    /// Resolve a trigger key to a transition and perform it.
    async fn handle_trigger(&self, key: &str) -> Result<(), StateMachineError> {
        let current = self.current_state();
        let Some(current) = current else {
            return Err(StateMachineError::not_started(self.name()));
        };

        let transition = match current.lookup(key) {
            Some(local) => Some(local),
            None => self.core().transitions.get(bare_trigger(key)).cloned(),
        };
        let Some(target) = transition.and_then(|t| t.target_state()) else {
            return Err(StateMachineError::invalid_transition(
                self.name(),
                current.name(),
                key,
            ));
        };

        debug!("resolved {key} to {} on {}", target.id(), self.inner.name);
        self.change_state(target, Some(key)).await
    }

    /// Leave the current state (unless an exit hook vetoes) and enter `target`.
    async fn change_state(
        &self,
        target: State<C>,
        trigger: Option<&str>,
    ) -> Result<(), StateMachineError> {
        let current = self.current_state();
        if let Some(current) = current.as_ref().filter(|c| **c == target) {
            return Err(StateMachineError::already_in_state(
                self.name(),
                current.name(),
            ));
        }

        let mut allow_exit = true;
        if let Some(current) = &current {
            if let Some(exit) = current.exit_action() {
                allow_exit = exit(current.clone(), self.context())
                    .await
                    .map_err(|e| self.hook_error(current, e))?;
            }
            // The machine-level verdict replaces the state's verdict.
            if let Some(exit) = &self.inner.exit_action {
                allow_exit = exit(current.clone(), self.context())
                    .await
                    .map_err(|e| self.hook_error(current, e))?;
            }
        }

        if !allow_exit {
            debug!(
                "{}: exit from {} vetoed",
                self.inner.name,
                current.as_ref().map_or("<none>", State::id)
            );
            return Ok(());
        }

        let from = {
            let mut core = self.core();
            let from = core.current_state.take();
            let change = StateChange {
                from: from.as_ref().map(|s| s.id().to_string()),
                to: target.id().to_string(),
                trigger: trigger.map(str::to_string),
                timestamp: Utc::now(),
            };
            core.history.record(change);
            core.previous_state = from.clone();
            core.current_state = Some(target.clone());
            from
        };
        info!(
            "{}: {} -> {}",
            self.inner.name,
            from.as_ref().map_or("<none>", State::id),
            target.id()
        );

        if let Some(entry) = target.entry_action() {
            entry(target.clone(), self.context())
                .await
                .map_err(|e| self.hook_error(&target, e))?;
        }
        if let Some(entry) = &self.inner.entry_action {
            entry(target.clone(), self.context())
                .await
                .map_err(|e| self.hook_error(&target, e))?;
        }
        Ok(())
    }

    fn hook_error(&self, state: &State<C>, error: HookError) -> StateMachineError {
        StateMachineError::from_hook(self.name(), state.name(), error)
    }
}

impl<C> Clone for StateMachine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for StateMachine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

/// Clears the busy flag when the queue processor fails or is dropped
/// mid-transition. Disarmed once the processor has gone idle on its own.
struct ReleaseOnDrop<'a, C> {
    machine: &'a MachineInner<C>,
    armed: bool,
}

impl<C> Drop for ReleaseOnDrop<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let dropped = lock(&self.machine.core).queue.release();
        if dropped > 0 {
            warn!(
                "{}: dropped {dropped} queued trigger(s) after a failed transition",
                self.machine.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_of_fresh_machine() {
        let machine = StateMachine::new("Order Flow");
        machine.create_state("placed", false, None, None).unwrap();

        let status = machine.status();

        assert_eq!(status.name, "Order Flow");
        assert_eq!(status.id, "order-flow");
        assert!(!status.started);
        assert!(!status.busy);
        assert_eq!(status.current_state, None);
        assert_eq!(status.states, vec!["placed".to_string()]);
    }

    #[test]
    fn core_membership_is_by_identity() {
        let machine = StateMachine::new("m");
        let registered = machine.create_state("s1", false, None, None).unwrap();
        let twin = State::new(&machine, "s1", false);

        let core = machine.core();
        assert!(core.contains(&registered));
        assert!(!core.contains(&twin));
    }

    #[test]
    fn global_transition_lookup_normalizes() {
        let machine = StateMachine::new("m");
        let s1 = machine.create_state("s1", false, None, None).unwrap();
        machine.add_global_transition("Go Home", &s1).unwrap();

        let transition = machine.global_transition("goHome").unwrap();
        assert_eq!(transition.trigger_id(), "go-home");
        assert_eq!(transition.target_state(), Some(s1));
    }

    #[test]
    fn release_guard_clears_busy_and_pending() {
        let machine = StateMachine::new("m");
        {
            let mut core = machine.core();
            core.queue.enqueue("a".to_string());
            core.queue.enqueue("b".to_string());
            assert!(core.queue.acquire());
        }

        drop(ReleaseOnDrop {
            machine: &machine.inner,
            armed: true,
        });

        assert!(!machine.busy());
        assert_eq!(machine.pending_triggers(), 0);
    }

    #[test]
    fn idle_processor_leaves_a_new_processor_alone() {
        let machine = StateMachine::new("m");
        let mut release = ReleaseOnDrop {
            machine: &machine.inner,
            armed: true,
        };
        assert!(machine.core().queue.acquire());

        // The processor sees an empty queue and goes idle in one step.
        assert_eq!(machine.core().queue.next_or_release(), None);
        release.armed = false;
        assert!(!machine.busy());

        // A trigger arriving now takes over processing.
        {
            let mut core = machine.core();
            core.queue.enqueue("late".to_string());
            assert!(core.queue.acquire());
        }
        drop(release);

        assert!(machine.busy());
        assert_eq!(machine.pending_triggers(), 1);
    }

    #[tokio::test]
    async fn start_records_initial_entry_in_history() {
        let machine = StateMachine::new("m");
        machine.create_state("s1", false, None, None).unwrap();

        machine.start().await.unwrap();

        let history = machine.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history.changes()[0].from, None);
        assert_eq!(history.changes()[0].to, "s-1");
        assert_eq!(history.changes()[0].trigger, None);
    }

    #[tokio::test]
    async fn trigger_before_start_queues_nothing() {
        let machine = StateMachine::new("m");
        machine.create_state("s1", false, None, None).unwrap();

        let err = machine.trigger_global("anything").await.unwrap_err();

        assert_eq!(err.kind, crate::effects::ErrorKind::NotStarted);
        assert_eq!(machine.pending_triggers(), 0);
    }
}
