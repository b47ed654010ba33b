use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::models::{Alert, Decision};

/// One gauge sample. Labels are kept sorted so identical label sets compare
/// and hash equal regardless of construction order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl MetricSample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// One sample per nested decision, timestamped with the decision's creation
/// time or, failing that, the alert's.
pub fn samples_for_alerts(alerts: &[Alert], instance: &str) -> Vec<MetricSample> {
    alerts
        .iter()
        .flat_map(|alert| {
            alert
                .decisions
                .iter()
                .map(move |decision| decision_sample(decision, instance, alert.created_at_time()))
        })
        .collect()
}

pub fn samples_for_decisions(decisions: &[Decision], instance: &str) -> Vec<MetricSample> {
    decisions
        .iter()
        .map(|decision| decision_sample(decision, instance, None))
        .collect()
}

fn decision_sample(
    decision: &Decision,
    instance: &str,
    fallback: Option<DateTime<Utc>>,
) -> MetricSample {
    let labels = [
        ("instance", instance.to_string()),
        ("country", decision.country.clone()),
        ("asname", decision.as_name.clone()),
        ("asnumber", decision.as_number.clone()),
        ("latitude", format!("{:.6}", decision.latitude)),
        ("longitude", format!("{:.6}", decision.longitude)),
        ("iprange", decision.ip_range.clone()),
        ("scenario", decision.scenario.clone()),
        ("type", decision.decision_type.clone()),
        ("duration", decision.duration.clone()),
        ("scope", decision.scope.clone()),
        ("ip", decision.value.clone()),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value))
    .collect();

    MetricSample {
        labels,
        value: 1.0,
        timestamp: decision.created_at_time().or(fallback),
    }
}
