//! Pure building blocks of the state machine.
//!
//! This module contains the parts that have no side effects:
//! - Identifier normalization for states, machines and triggers
//! - Bounded history of committed state changes
//!
//! The effectful orchestration lives in [`crate::effects`].

mod history;
mod id;

pub use history::{StateChange, StateHistory, DEFAULT_HISTORY_LIMIT};
pub use id::{bare_trigger, local_trigger_key, normalize_id, KEY_SEPARATOR};
