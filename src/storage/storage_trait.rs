//! Storage Trait
//!
//! `DecisionStorage` is the interface the snapshot collector uses to keep the
//! set of active decisions between stream polls.

use crate::models::Decision;

/// A mutable set of active decisions keyed by uuid.
///
/// Implementors must be safe to share between concurrent scrapes. No method
/// performs I/O.
pub trait DecisionStorage: Send + Sync {
    /// Appends every decision, in order.
    fn insert_all(&self, decisions: Vec<Decision>);

    /// Removes every stored decision whose uuid is listed. Unknown uuids are ignored.
    fn remove_all(&self, uuids: &[String]);

    /// Copy of the current contents.
    fn snapshot(&self) -> Vec<Decision>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
