use chrono::{DateTime, Utc};
use serde_json::Value;

use super::duration::{reconcile, DurationInputs, DurationStrategy};
use super::loose_record::LooseRecord;
use crate::error_handling::types::DecodeError;
use crate::models::{Alert, Decision, DecisionDelta};

/// Counts gathered while normalizing one payload, logged as a debug summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub alerts: usize,
    pub decisions: usize,
    /// Array entries that were not JSON objects and were dropped.
    pub skipped: usize,
}

/// Normalizes an alert listing. `null` is an empty listing; anything other
/// than an array is a [`DecodeError`]. Individual entries never fail the batch.
pub fn normalize_alerts(
    body: &Value,
    strategy: DurationStrategy,
    now: DateTime<Utc>,
) -> Result<(Vec<Alert>, NormalizeStats), DecodeError> {
    let items = match body {
        Value::Null => return Ok((Vec::new(), NormalizeStats::default())),
        Value::Array(items) => items,
        other => {
            return Err(DecodeError::UnexpectedShape(format!(
                "expected an array of alerts, got {}",
                kind(other)
            )))
        }
    };

    let mut stats = NormalizeStats::default();
    let mut alerts = Vec::with_capacity(items.len());
    for item in items {
        match LooseRecord::from_value(item) {
            Some(record) => {
                let (alert, skipped) = normalize_alert(record, strategy, now);
                stats.decisions += alert.decisions.len();
                stats.skipped += skipped;
                alerts.push(alert);
            }
            None => stats.skipped += 1,
        }
    }
    stats.alerts = alerts.len();
    Ok((alerts, stats))
}

/// Maps one alert record and its nested decisions. A decision without its
/// own scenario inherits the alert's. Returns the number of nested decision
/// entries that were not objects.
pub fn normalize_alert(
    record: LooseRecord<'_>,
    strategy: DurationStrategy,
    now: DateTime<Utc>,
) -> (Alert, usize) {
    let mut alert = Alert {
        id: record.i64_field("id"),
        scenario: record.str_field("scenario").to_string(),
        created_at: record.str_field("created_at").to_string(),
        start_at: record.str_field("start_at").to_string(),
        stop_at: record.str_field("stop_at").to_string(),
        ..Default::default()
    };

    if let Some(source) = record.record("source") {
        alert.ip = source.str_field("ip").to_string();
        alert.latitude = source.f64_field("latitude");
        alert.longitude = source.f64_field("longitude");
        alert.country = source.str_field("cn").to_string();
        alert.as_name = source.str_field("as_name").to_string();
        alert.as_number = source.str_field("as_number").to_string();
        let range = source.str_field("range");
        if !range.is_empty() {
            alert.subnet = range.to_string();
            alert.ip_range = range.to_string();
        }
    }

    let (entries, skipped) = record.records("decisions");
    alert.decisions = entries
        .into_iter()
        .map(|entry| {
            let mut decision = decision_fields(entry);
            let created_at = if decision.created_at.is_empty() {
                alert.created_at.as_str()
            } else {
                decision.created_at.as_str()
            };
            decision.duration = reconcile(
                strategy,
                DurationInputs {
                    reported: entry.str_field("duration"),
                    created_at,
                    until: &decision.until,
                    reference: &alert.created_at,
                },
                now,
            );
            if decision.scenario.is_empty() {
                decision.scenario = alert.scenario.clone();
            }
            decision.country = alert.country.clone();
            decision.as_name = alert.as_name.clone();
            decision.as_number = alert.as_number.clone();
            decision.latitude = alert.latitude;
            decision.longitude = alert.longitude;
            decision.ip_range = alert.ip_range.clone();
            decision
        })
        .collect();

    (alert, skipped)
}

/// Normalizes a `{new, deleted}` delta. Either list may be `null` or absent;
/// deleted entries without a uuid are dropped.
pub fn normalize_decision_delta(
    body: &Value,
    strategy: DurationStrategy,
    now: DateTime<Utc>,
) -> Result<(DecisionDelta, NormalizeStats), DecodeError> {
    let record = LooseRecord::from_value(body).ok_or_else(|| {
        DecodeError::UnexpectedShape(format!(
            "expected a decision stream object, got {}",
            kind(body)
        ))
    })?;

    let (new_entries, skipped_new) = record.records("new");
    let (deleted_entries, skipped_deleted) = record.records("deleted");

    let new: Vec<Decision> = new_entries
        .into_iter()
        .map(|entry| normalize_stream_decision(entry, strategy, now))
        .collect();
    let deleted: Vec<String> = deleted_entries
        .into_iter()
        .map(|entry| entry.str_field("uuid"))
        .filter(|uuid| !uuid.is_empty())
        .map(str::to_string)
        .collect();

    let stats = NormalizeStats {
        alerts: 0,
        decisions: new.len(),
        skipped: skipped_new + skipped_deleted,
    };
    Ok((DecisionDelta { new, deleted }, stats))
}

/// A stream decision has no owning alert: geo fields stay empty and the
/// remaining duration is measured from the decision's own `created_at`.
pub fn normalize_stream_decision(
    entry: LooseRecord<'_>,
    strategy: DurationStrategy,
    now: DateTime<Utc>,
) -> Decision {
    let mut decision = decision_fields(entry);
    decision.duration = reconcile(
        strategy,
        DurationInputs {
            reported: entry.str_field("duration"),
            created_at: &decision.created_at,
            until: &decision.until,
            reference: &decision.created_at,
        },
        now,
    );
    decision
}

fn decision_fields(entry: LooseRecord<'_>) -> Decision {
    Decision {
        id: entry.i64_field("id"),
        uuid: entry.str_field("uuid").to_string(),
        scenario: entry.str_field("scenario").to_string(),
        value: entry.str_field("value").to_string(),
        scope: entry.str_field("scope").to_string(),
        decision_type: entry.str_field("type").to_string(),
        origin: entry.str_field("origin").to_string(),
        created_at: entry.str_field("created_at").to_string(),
        until: entry.str_field("until").to_string(),
        ..Default::default()
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
