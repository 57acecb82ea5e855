//! Builder for constructing state machines.

use crate::builder::{entry_action, exit_action};
use crate::core::DEFAULT_HISTORY_LIMIT;
use crate::effects::{EntryAction, ExitAction, HookError, State, StateMachine};
use std::future::Future;
use std::sync::Arc;

/// Builder for a [`StateMachine`]'s name, context and machine-level hooks.
///
/// Machine-level hooks run for every state: the entry hook after the
/// entered state's own entry hook, the exit hook after the left state's own
/// exit hook. The machine-level exit verdict replaces the state's verdict.
pub struct StateMachineBuilder<C: Send + Sync + 'static> {
    name: String,
    context: Option<Arc<C>>,
    entry_action: Option<EntryAction<C>>,
    exit_action: Option<ExitAction<C>>,
    history_limit: usize,
}

impl<C: Send + Sync + 'static> StateMachineBuilder<C> {
    /// Create a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: None,
            entry_action: None,
            exit_action: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set the context handed to every hook.
    pub fn context(self, context: C) -> Self {
        self.shared_context(Arc::new(context))
    }

    /// Set a context the caller keeps a handle to.
    pub fn shared_context(mut self, context: Arc<C>) -> Self {
        self.context = Some(context);
        self
    }

    /// Set the machine-level entry hook from an async closure.
    pub fn on_entry<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(State<C>, Option<Arc<C>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.entry_action = Some(entry_action(f));
        self
    }

    /// Set the machine-level exit hook from an async closure.
    pub fn on_exit<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(State<C>, Option<Arc<C>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, HookError>> + Send + 'static,
    {
        self.exit_action = Some(exit_action(f));
        self
    }

    /// Set an already constructed machine-level entry hook.
    pub fn entry_action(mut self, action: EntryAction<C>) -> Self {
        self.entry_action = Some(action);
        self
    }

    /// Set an already constructed machine-level exit hook.
    pub fn exit_action(mut self, action: ExitAction<C>) -> Self {
        self.exit_action = Some(action);
        self
    }

    /// Keep at most `limit` committed changes in the machine's history.
    ///
    /// Defaults to [`DEFAULT_HISTORY_LIMIT`]. Zero disables history.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build the state machine.
    pub fn build(self) -> StateMachine<C> {
        StateMachine::from_parts(
            self.name,
            self.context,
            self.entry_action,
            self.exit_action,
            self.history_limit,
        )
    }
}
