//! Metric snapshots.
//!
//! - `sample`: one labelled gauge sample per decision.
//! - `collector`: fetches from the local API and keeps the last good snapshot.
//! - `exposition`: Prometheus text rendering of a snapshot.

pub mod collector;
pub mod exposition;
pub mod sample;


pub use collector::{CollectorSettings, ExporterMode, SnapshotCollector};
pub use exposition::{render, METRIC_NAME};
pub use sample::MetricSample;
