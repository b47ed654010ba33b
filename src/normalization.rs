//! Record normalization.
//!
//! Pure functions mapping loosely-typed upstream JSON into the [`Alert`] and
//! [`Decision`] model. Nothing here performs I/O or touches shared state; every
//! function is deterministic given its input and the `now` it is handed.
//!
//! - `loose_record`: typed accessors that degrade to zero values.
//! - `duration`: Go-style duration grammar and the reconciliation strategies.
//! - `normalizer`: alert, decision and delta mapping.
//!
//! [`Alert`]: crate::models::Alert
//! [`Decision`]: crate::models::Decision

pub mod duration;
pub mod loose_record;
pub mod normalizer;

pub use duration::DurationStrategy;
pub use loose_record::LooseRecord;
pub use normalizer::{normalize_alerts, normalize_decision_delta, NormalizeStats};
