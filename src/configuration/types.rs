use clap::ValueEnum;
use log::LevelFilter;
use serde::Deserialize;

use crate::metrics::ExporterMode;
use crate::normalization::DurationStrategy;

/// Contents of the optional TOML configuration file. Every key is optional;
/// command-line flags and environment variables take precedence.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub crowdsec: CrowdsecSection,
    pub server: ServerSection,
    pub exporter: ExporterSection,
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrowdsecSection {
    pub url: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub registration_token: Option<String>,
    pub machine_name: Option<String>,
    pub deregister_on_exit: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub listen_address: Option<String>,
    pub metrics_path: Option<String>,
    pub scrape_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterSection {
    pub instance_name: Option<String>,
    pub mode: Option<ExporterMode>,
    pub alert_limit: Option<usize>,
    pub max_retries: Option<u32>,
    pub duration_strategy: Option<DurationStrategy>,
    pub retry_backoff: Option<BackoffKind>,
    pub retry_base_ms: Option<u64>,
    pub retry_max_ms: Option<u64>,
}

/// Shape of the delay between retried upstream requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    None,
    Fixed,
    #[default]
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
        }
    }
}
