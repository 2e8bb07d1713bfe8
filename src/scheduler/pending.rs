//! Results awaiting in-order delivery.
//!
//! Every dispatched task gets the next [`Sequence`]. Entries are completed in
//! place and only leave from the front, so delivery order equals dispatch
//! order, which equals submission order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::task::TaskOutcome;

/// Dispatch order of a task. Monotonic, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sequence(pub u64);

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Ordered map from sequence to `None` (running) or the final outcome.
#[derive(Debug, Default)]
pub struct PendingResults {
    entries: BTreeMap<Sequence, Option<TaskOutcome>>,
    next: u64,
}

impl PendingResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next entry in the running state.
    pub fn allocate(&mut self) -> Sequence {
        let seq = Sequence(self.next);
        self.next += 1;
        self.entries.insert(seq, None);
        seq
    }

    /// Store the outcome for `sequence`. Returns false if the entry is unknown
    /// or already final.
    pub fn complete(&mut self, sequence: Sequence, outcome: TaskOutcome) -> bool {
        match self.entries.get_mut(&sequence) {
            Some(slot @ None) => {
                *slot = Some(outcome);
                true
            }
            _ => false,
        }
    }

    /// Pop the head if it is final. A running head blocks everything behind it.
    pub fn pop_ready(&mut self) -> Option<(Sequence, TaskOutcome)> {
        let head = self.entries.first_entry()?;
        if head.get().is_none() {
            return None;
        }
        let (seq, outcome) = head.remove_entry();
        outcome.map(|o| (seq, o))
    }

    /// Lowest sequence still awaiting delivery.
    pub fn head(&self) -> Option<Sequence> {
        self.entries.keys().next().copied()
    }

    pub fn is_ready(&self, sequence: Sequence) -> bool {
        matches!(self.entries.get(&sequence), Some(Some(_)))
    }

    /// Entries whose task is still running.
    pub fn running(&self) -> usize {
        self.entries.values().filter(|v| v.is_none()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequences handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next
    }
}
