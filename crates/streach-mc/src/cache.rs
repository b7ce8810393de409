//! Memoization of oracle verdicts per parameter assignment.

use crate::{Assignment, DriveError, DriveResult, Verdict};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Concurrent map from assignment to verdict.
///
/// Grows monotonically; entries are never removed or overwritten. A repeated
/// insert with the same verdict is a no-op, while a conflicting verdict for
/// an already-recorded assignment means the oracle is not a function of its
/// input and must abort the run.
#[derive(Debug, Default)]
pub struct TrialCache {
    map: DashMap<Assignment, Verdict>,
}

impl TrialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verdict previously recorded for this assignment, if any.
    pub fn lookup(&self, assignment: &Assignment) -> Option<Verdict> {
        self.map.get(assignment).map(|entry| *entry.value())
    }

    /// Record a verdict. Idempotent for equal verdicts; conflicting verdicts
    /// are flagged, never overwritten.
    pub fn insert(&self, assignment: Assignment, verdict: Verdict) -> DriveResult<()> {
        match self.map.entry(assignment) {
            Entry::Vacant(slot) => {
                slot.insert(verdict);
                Ok(())
            }
            Entry::Occupied(slot) => {
                if *slot.get() == verdict {
                    Ok(())
                } else {
                    Err(DriveError::OracleNondeterministic {
                        assignment: slot.key().clone(),
                    })
                }
            }
        }
    }

    /// Number of distinct assignments recorded.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
