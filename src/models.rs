//! Alert and decision records.
//!
//! Both are immutable value records scoped to one fetch-and-render cycle; no
//! cycle's records are referenced or mutated by the next one.

pub mod alert;
pub mod decision;

pub use alert::Alert;
pub use decision::{Decision, DecisionDelta};
