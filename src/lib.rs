//! Fusium: an async finite state machine with a single-flight trigger queue
//!
//! Callers declare named states, local and global transitions between them
//! and optional async entry/exit hooks, then drive the machine by emitting
//! triggers. Exactly one transition is processed at a time: external
//! triggers arriving while the machine is busy are rejected, and triggers
//! raised from inside hooks are queued behind the one in flight.
//!
//! # Core Concepts
//!
//! - **State**: A named handle owning its local transitions and hooks
//! - **Transition**: Trigger id plus a weak reference to the target state
//! - **StateMachine**: Registry, lifecycle and trigger queue
//! - **Hooks**: Async or plain functions; exit hooks may veto a change and
//!   async entry hooks may chain triggers
//!
//! # Example
//!
//! ```rust
//! use fusium::builder::{entry_action, exit_action};
//! use fusium::{HookError, StateMachine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), fusium::StateMachineError> {
//! let machine = StateMachine::new("order");
//! let placed = machine.create_state(
//!     "placed",
//!     false,
//!     // Move straight on to payment as soon as the order is placed.
//!     Some(entry_action(|state, _ctx| async move {
//!         state.trigger_internal("pay").await?;
//!         Ok::<(), HookError>(())
//!     })),
//!     None,
//! )?;
//! let paid = machine.create_state("paid", false, None, None)?;
//! let shipped = machine.create_state(
//!     "shipped",
//!     true,
//!     None,
//!     Some(exit_action(|_state, _ctx| async { Ok::<bool, HookError>(false) })),
//! )?;
//!
//! placed.add_transition("pay", &paid)?;
//! paid.add_transition("ship", &shipped)?;
//!
//! machine.start().await?;
//! assert_eq!(machine.current_state(), Some(paid));
//!
//! machine.trigger("ship").await?;
//! assert!(machine.is_complete());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod core;
pub mod effects;

// Re-export commonly used types
pub use builder::StateMachineBuilder;
pub use core::{normalize_id, StateChange, StateHistory};
pub use effects::{
    BoxFuture, EntryAction, ErrorCategory, ErrorKind, ExitAction, HookError, MachineStatus, State,
    StateMachine, StateMachineError, Transition,
};
