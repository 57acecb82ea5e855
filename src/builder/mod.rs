//! Builder API for ergonomic state machine construction.
//!
//! This module provides the fluent [`StateMachineBuilder`] for the machine's
//! optional parts, and adapters that turn closures into entry and exit hooks.
//! [`entry_action`] and [`exit_action`] take async closures; the `sync_`
//! variants take plain functions for hooks that never wait.

pub mod machine;

pub use machine::StateMachineBuilder;

use crate::effects::{BoxFuture, EntryAction, ExitAction, HookError, State};
use std::future::Future;
use std::sync::Arc;

/// Wrap an async closure as an entry hook.
///
/// # Example
///
/// ```
/// use fusium::builder::entry_action;
/// use fusium::{EntryAction, HookError, State};
/// use std::sync::Arc;
///
/// let hook: EntryAction<()> = entry_action(|state: State, _ctx: Option<Arc<()>>| async move {
///     println!("entered {}", state.name());
///     Ok::<(), HookError>(())
/// });
/// ```
pub fn entry_action<C, F, Fut>(f: F) -> EntryAction<C>
where
    C: Send + Sync + 'static,
    F: Fn(State<C>, Option<Arc<C>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HookError>> + Send + 'static,
{
    Arc::new(
        move |state: State<C>, context: Option<Arc<C>>| -> BoxFuture<Result<(), HookError>> {
            Box::pin(f(state, context))
        },
    )
}

/// Wrap an async closure as an exit hook.
///
/// The closure resolves to whether the machine may leave the state.
///
/// # Example
///
/// ```
/// use fusium::builder::exit_action;
/// use fusium::{ExitAction, HookError, State};
/// use std::sync::Arc;
///
/// let locked: ExitAction<()> = exit_action(|_state: State, _ctx: Option<Arc<()>>| async move {
///     Ok::<bool, HookError>(false)
/// });
/// ```
pub fn exit_action<C, F, Fut>(f: F) -> ExitAction<C>
where
    C: Send + Sync + 'static,
    F: Fn(State<C>, Option<Arc<C>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, HookError>> + Send + 'static,
{
    Arc::new(
        move |state: State<C>, context: Option<Arc<C>>| -> BoxFuture<Result<bool, HookError>> {
            Box::pin(f(state, context))
        },
    )
}

/// Wrap a synchronous function as an entry hook.
///
/// The function runs to completion when the state is entered; the hook's
/// future is already resolved when the machine polls it.
///
/// # Example
///
/// ```
/// use fusium::builder::sync_entry_action;
/// use fusium::{EntryAction, HookError};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let count: EntryAction<AtomicUsize> = sync_entry_action(|_state, visits: Option<&AtomicUsize>| {
///     if let Some(visits) = visits {
///         visits.fetch_add(1, Ordering::SeqCst);
///     }
///     Ok::<(), HookError>(())
/// });
/// ```
pub fn sync_entry_action<C, F>(f: F) -> EntryAction<C>
where
    C: Send + Sync + 'static,
    F: Fn(&State<C>, Option<&C>) -> Result<(), HookError> + Send + Sync + 'static,
{
    Arc::new(
        move |state: State<C>, context: Option<Arc<C>>| -> BoxFuture<Result<(), HookError>> {
            Box::pin(std::future::ready(f(&state, context.as_deref())))
        },
    )
}

/// Wrap a synchronous function as an exit hook.
///
/// Returning `Ok(false)` vetoes the state change.
pub fn sync_exit_action<C, F>(f: F) -> ExitAction<C>
where
    C: Send + Sync + 'static,
    F: Fn(&State<C>, Option<&C>) -> Result<bool, HookError> + Send + Sync + 'static,
{
    Arc::new(
        move |state: State<C>, context: Option<Arc<C>>| -> BoxFuture<Result<bool, HookError>> {
            Box::pin(std::future::ready(f(&state, context.as_deref())))
        },
    )
}
