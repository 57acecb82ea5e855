//! Effectful state machine operations.
//!
//! This module is the imperative shell around the pure [`crate::core`]:
//! states and transitions, caller-supplied hooks, and the orchestrator that
//! resolves triggers and serializes them through a single-flight queue.
//!
//! # Key Concepts
//!
//! - **States**: Named handles owning their local transitions and hooks
//! - **Transitions**: Local (per state) or global (per machine), local wins
//! - **Hooks**: Async entry/exit callbacks; an exit hook can veto a change
//! - **Queue**: One trigger in flight; hooks may queue more behind it

mod action;
mod error;
mod machine;
mod queue;
mod state;
mod transition;

pub use action::{BoxFuture, EntryAction, ExitAction};
pub use error::{ErrorCategory, ErrorKind, HookError, StateMachineError};
pub use machine::{MachineStatus, StateMachine};
pub use state::State;
pub use transition::Transition;
