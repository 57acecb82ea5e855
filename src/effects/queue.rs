//! Single-flight trigger queue.
//!
//! Pending trigger keys wait here in arrival order. The `busy` flag marks
//! that one caller is currently draining the queue; everyone else either
//! appends (internal triggers) or is turned away (external triggers).

use std::collections::VecDeque;

#[derive(Debug, Default)]
pub(crate) struct TriggerQueue {
    pending: VecDeque<String>,
    busy: bool,
}

impl TriggerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&mut self, key: String) {
        self.pending.push_back(key);
    }

    /// Become the processor. Returns `false` if another caller already is.
    pub(crate) fn acquire(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Take the next key, or stop processing if there is none.
    pub(crate) fn next_or_release(&mut self) -> Option<String> {
        let next = self.pending.pop_front();
        if next.is_none() {
            self.busy = false;
        }
        next
    }

    /// Stop processing. Any keys still waiting are dropped and counted.
    pub(crate) fn release(&mut self) -> usize {
        self.busy = false;
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}
