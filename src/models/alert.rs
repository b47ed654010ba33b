use chrono::{DateTime, Utc};
use serde::Serialize;

use super::decision::{parse_timestamp, Decision};

/// One upstream security event, bundling zero or more enforcement decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Alert {
    pub id: i64,
    pub scenario: String,
    /// ISO-8601 creation time as reported upstream.
    pub created_at: String,
    pub start_at: String,
    pub stop_at: String,
    /// Source address of the offending host.
    pub ip: String,
    pub subnet: String,
    pub ip_range: String,
    pub latitude: f64,
    pub longitude: f64,
    /// ISO country code.
    pub country: String,
    pub as_name: String,
    pub as_number: String,
    pub decisions: Vec<Decision>,
}

impl Alert {
    /// Parsed `created_at`, if it is a valid RFC3339 timestamp.
    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}
