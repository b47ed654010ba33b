use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::storage_trait::DecisionStorage;
use crate::models::Decision;

/// In-memory [`DecisionStorage`].
///
/// Removal swaps the last element into the freed slot, so insertion order is
/// not preserved across deletions.
#[derive(Debug, Default)]
pub struct DecisionStore {
    decisions: Mutex<Vec<Decision>>,
}

impl DecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Decision>> {
        self.decisions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DecisionStorage for DecisionStore {
    fn insert_all(&self, decisions: Vec<Decision>) {
        if decisions.is_empty() {
            return;
        }
        self.lock().extend(decisions);
    }

    fn remove_all(&self, uuids: &[String]) {
        if uuids.is_empty() {
            return;
        }
        let doomed: HashSet<&str> = uuids.iter().map(String::as_str).collect();
        let mut decisions = self.lock();
        let mut i = 0;
        while i < decisions.len() {
            if doomed.contains(decisions[i].uuid.as_str()) {
                decisions.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    fn snapshot(&self) -> Vec<Decision> {
        self.lock().clone()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
