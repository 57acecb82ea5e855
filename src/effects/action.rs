//! Entry and exit hook capability types.

use crate::effects::error::HookError;
use crate::effects::state::State;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed, sendable future returned by hooks.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Hook awaited after the machine has entered a state.
///
/// Receives the state that was entered and the machine context.
pub type EntryAction<C> =
    Arc<dyn Fn(State<C>, Option<Arc<C>>) -> BoxFuture<Result<(), HookError>> + Send + Sync>;

/// Hook awaited before the machine leaves a state.
///
/// Receives the state being left and the machine context. Resolving to
/// `false` vetoes the state change.
pub type ExitAction<C> =
    Arc<dyn Fn(State<C>, Option<Arc<C>>) -> BoxFuture<Result<bool, HookError>> + Send + Sync>;
