use chrono::{DateTime, Utc};
use serde::Serialize;

/// One concrete enforcement action (e.g. an IP ban).
///
/// The geo/ASN fields are copied from the owning alert; a decision has no
/// independent geo source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Decision {
    pub id: i64,
    /// Stable, upstream-assigned identity.
    pub uuid: String,
    pub scenario: String,
    /// Subject IP address or range.
    pub value: String,
    /// "ip", "range", ...
    pub scope: String,
    /// "ban", "captcha", ...
    pub decision_type: String,
    pub origin: String,
    pub created_at: String,
    /// Absolute expiry, when reported.
    pub until: String,
    /// Reconciled duration, empty when it could not be determined.
    pub duration: String,
    pub country: String,
    pub as_name: String,
    pub as_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub ip_range: String,
}

impl Decision {
    pub fn created_at_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

/// Result of one poll of the incremental decision stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionDelta {
    pub new: Vec<Decision>,
    /// UUIDs of decisions removed upstream since the previous poll.
    pub deleted: Vec<String>,
}

/// Parses an RFC3339 timestamp, returning `None` for empty or invalid input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
