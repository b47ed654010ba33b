//! Decision storage for stream mode.
//!
//! Components:
//! - `storage_trait`: the `DecisionStorage` trait the collector writes through.
//! - `decision_store`: in-memory implementation guarded by a single mutex.

pub mod decision_store;
pub mod storage_trait;

pub use decision_store::DecisionStore;
pub use storage_trait::DecisionStorage;
