//! State change history tracking.
//!
//! Every committed state change is recorded as a value, giving callers an
//! ordered trail of where a machine has been since it was last started. The
//! history is for observation only and is cleared by a reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Record of a single committed state change.
///
/// # Example
///
/// ```rust
/// use fusium::core::StateChange;
/// use chrono::Utc;
///
/// let change = StateChange {
///     from: Some("idle".to_string()),
///     to: "running".to_string(),
///     trigger: Some("idle:start".to_string()),
///     timestamp: Utc::now(),
/// };
/// assert_eq!(change.to, "running");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Id of the state that was left; `None` when the machine was starting
    pub from: Option<String>,
    /// Id of the state that was entered
    pub to: String,
    /// Trigger key that caused the change, if it was trigger driven
    pub trigger: Option<String>,
    /// When the change was committed
    pub timestamp: DateTime<Utc>,
}

/// Number of changes a machine keeps unless configured otherwise.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Ordered history of committed state changes.
///
/// A history may be bounded: once it holds `limit` changes, recording a new
/// one evicts the oldest. A limit of zero records nothing.
///
/// # Example
///
/// ```rust
/// use fusium::core::{StateChange, StateHistory};
/// use chrono::Utc;
///
/// let mut history = StateHistory::with_limit(2);
/// for (from, to) in [(None, "start"), (Some("start"), "middle"), (Some("middle"), "end")] {
///     history.record(StateChange {
///         from: from.map(str::to_string),
///         to: to.to_string(),
///         trigger: None,
///         timestamp: Utc::now(),
///     });
/// }
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.get_path(), vec!["start", "middle", "end"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHistory {
    changes: VecDeque<StateChange>,
    #[serde(default)]
    limit: Option<usize>,
}

impl StateHistory {
    /// Create a new empty, unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty history keeping at most `limit` changes.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            changes: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit: Some(limit),
        }
    }

    /// Maximum number of changes kept, if bounded.
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Append a change, evicting the oldest one when the history is full.
    pub fn record(&mut self, change: StateChange) -> &mut Self {
        match self.limit {
            Some(0) => return self,
            Some(limit) if self.changes.len() >= limit => {
                self.changes.pop_front();
            }
            _ => {}
        }
        self.changes.push_back(change);
        self
    }

    /// Drop every recorded change, keeping the limit.
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Get the ids of the states visited, in order.
    ///
    /// The path starts with the `from` of the oldest kept change when there
    /// is one (a history recorded from a fresh start begins with the start
    /// state).
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.changes.len() + 1);
        if let Some(from) = self.changes.front().and_then(|c| c.from.as_deref()) {
            path.push(from);
        }
        path.extend(self.changes.iter().map(|c| c.to.as_str()));
        path
    }

    /// Time elapsed between the oldest and the newest kept change.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.changes.front()?, self.changes.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// Kept changes, oldest first.
    pub fn changes(&self) -> &VecDeque<StateChange> {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }
}
