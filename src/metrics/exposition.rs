//! Prometheus text exposition of a sample snapshot.

use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::{BTreeMap, HashMap};

use super::sample::MetricSample;
use crate::error_handling::types::WebError;
use crate::normalization::DurationStrategy;

pub const METRIC_NAME: &str = "cs_lapi_decision";

pub fn help_text(strategy: DurationStrategy) -> String {
    format!(
        "CrowdSec decision with geographical and ASN metadata; {}",
        strategy.describe()
    )
}

/// Collapses samples sharing a label set; the latest timestamp wins and
/// first-seen order is kept.
pub fn dedup(samples: &[MetricSample]) -> Vec<&MetricSample> {
    let mut index: HashMap<&BTreeMap<String, String>, usize> = HashMap::new();
    let mut unique: Vec<&MetricSample> = Vec::with_capacity(samples.len());
    for sample in samples {
        match index.get(&sample.labels) {
            Some(&slot) => {
                if sample.timestamp > unique[slot].timestamp {
                    unique[slot] = sample;
                }
            }
            None => {
                index.insert(&sample.labels, unique.len());
                unique.push(sample);
            }
        }
    }
    unique
}

/// Renders the snapshot as one gauge family. An empty snapshot renders as an
/// empty body.
pub fn render(samples: &[MetricSample], strategy: DurationStrategy) -> Result<String, WebError> {
    let unique = dedup(samples);
    if unique.is_empty() {
        return Ok(String::new());
    }

    let mut family = MetricFamily::default();
    family.set_name(METRIC_NAME.to_string());
    family.set_help(help_text(strategy));
    family.set_field_type(MetricType::GAUGE);
    for sample in unique {
        family.mut_metric().push(to_metric(sample));
    }

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&[family], &mut buffer)
        .map_err(|e| WebError::EncodingFailed(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| WebError::EncodingFailed(e.to_string()))
}

fn to_metric(sample: &MetricSample) -> Metric {
    let mut metric = Metric::default();
    for (name, value) in &sample.labels {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.clone());
        metric.mut_label().push(pair);
    }
    let mut gauge = Gauge::default();
    gauge.set_value(sample.value);
    metric.set_gauge(gauge);
    if let Some(timestamp) = sample.timestamp {
        metric.set_timestamp_ms(timestamp.timestamp_millis());
    }
    metric
}
