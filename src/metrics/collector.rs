use clap::ValueEnum;
use log::{debug, error};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::sample::{samples_for_alerts, samples_for_decisions, MetricSample};
use crate::error_handling::types::FetchError;
use crate::lapi::UpstreamClient;
use crate::models::DecisionDelta;
use crate::normalization::DurationStrategy;
use crate::storage::DecisionStorage;

/// Where decisions are read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExporterMode {
    /// Decisions nested in the alert listing, with geo metadata.
    #[default]
    Alerts,
    /// The decision delta stream, accumulated in a decision store.
    Stream,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSettings {
    pub instance_name: String,
    pub mode: ExporterMode,
    pub alert_limit: usize,
    pub max_retries: u32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            instance_name: "crowdsec".to_string(),
            mode: ExporterMode::Alerts,
            alert_limit: 1000,
            max_retries: 5,
        }
    }
}

/// Produces the sample set for each scrape.
///
/// The last successful set is kept; a failed scrape serves it unchanged
/// instead of an empty page.
pub struct SnapshotCollector {
    client: UpstreamClient,
    store: Arc<dyn DecisionStorage>,
    settings: CollectorSettings,
    /// Set once a `startup=true` stream response has been applied.
    primed: AtomicBool,
    last: Mutex<Option<Vec<MetricSample>>>,
}

impl SnapshotCollector {
    pub fn new(client: UpstreamClient, store: Arc<dyn DecisionStorage>, settings: CollectorSettings) -> Self {
        Self {
            client,
            store,
            settings,
            primed: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }

    pub fn strategy(&self) -> DurationStrategy {
        self.client.strategy()
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub async fn collect(&self) -> Vec<MetricSample> {
        match self.fetch_samples().await {
            Ok(samples) => {
                debug!("collected {} samples", samples.len());
                *self.last_guard() = Some(samples.clone());
                samples
            }
            Err(e) => {
                let stale = self.last_snapshot();
                error!("scrape failed, serving {} previous samples: {}", stale.len(), e);
                stale
            }
        }
    }

    /// Previous successful sample set, empty before the first success.
    pub fn last_snapshot(&self) -> Vec<MetricSample> {
        self.last_guard().clone().unwrap_or_default()
    }

    async fn fetch_samples(&self) -> Result<Vec<MetricSample>, FetchError> {
        let instance = &self.settings.instance_name;
        match self.settings.mode {
            ExporterMode::Alerts => {
                let alerts = self
                    .client
                    .fetch_alerts(self.settings.alert_limit, self.settings.max_retries)
                    .await?;
                Ok(samples_for_alerts(&alerts, instance))
            }
            ExporterMode::Stream => {
                let startup = !self.primed.load(Ordering::SeqCst);
                let delta = self
                    .client
                    .fetch_decision_delta(startup, self.settings.max_retries)
                    .await?;
                if !startup {
                    self.apply(delta);
                } else if self.primed.swap(true, Ordering::SeqCst) {
                    debug!("store already primed by a concurrent scrape, dropping startup delta");
                } else {
                    self.apply(delta);
                }
                Ok(samples_for_decisions(&self.store.snapshot(), instance))
            }
        }
    }

    /// Deletions first, so a uuid both deleted and re-issued stays present.
    fn apply(&self, delta: DecisionDelta) {
        self.store.remove_all(&delta.deleted);
        self.store.insert_all(delta.new);
        debug!("decision store holds {} decisions", self.store.len());
    }

    fn last_guard(&self) -> MutexGuard<'_, Option<Vec<MetricSample>>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
