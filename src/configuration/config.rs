use super::types::*;
use clap::Parser;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error_handling::types::ConfigError;
use crate::lapi::{Backoff, RetryPolicy};
use crate::metrics::{CollectorSettings, ExporterMode};
use crate::normalization::DurationStrategy;
use crate::session_management::SessionConfig;

const DEFAULT_URL: &str = "http://localhost:8080";
const DEFAULT_LISTEN_ADDRESS: &str = ":9090";
const DEFAULT_METRICS_PATH: &str = "/metrics";
const DEFAULT_SCRAPE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INSTANCE_NAME: &str = "crowdsec";
const DEFAULT_ALERT_LIMIT: usize = 1000;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_BASE_MS: u64 = 100;
const DEFAULT_RETRY_MAX_MS: u64 = 2000;

/// Command-line arguments.
///
/// Every flag can also be supplied through a `CROWDSEC_EXPORTER_*`
/// environment variable. Flags left unset fall back to the configuration
/// file given by `--config`, then to built-in defaults.
///
/// # Fields Overview
///
/// - `config`: optional TOML file with `[crowdsec]`, `[server]` and `[exporter]` sections
/// - `crowdsec_*`: how to reach and authenticate against the local API
/// - `listen_address`, `metrics_path`, `scrape_timeout_secs`: the HTTP exposition endpoint
/// - the remaining flags tune collection, retries and logging
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "crowdsec-exporter", version, about)]
pub struct Args {
    /// Path to a TOML configuration file.
    ///
    /// # Command Line
    /// Use `--config <PATH>` to set this value from the CLI
    #[arg(long, env = "CROWDSEC_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the CrowdSec local API.
    #[arg(long, env = "CROWDSEC_EXPORTER_CROWDSEC_URL")]
    pub crowdsec_url: Option<String>,

    /// Machine login. Defaults to the machine name when self-registering.
    #[arg(long, env = "CROWDSEC_EXPORTER_CROWDSEC_LOGIN")]
    pub crowdsec_login: Option<String>,

    #[arg(long, env = "CROWDSEC_EXPORTER_CROWDSEC_PASSWORD", hide_env_values = true)]
    pub crowdsec_password: Option<String>,

    /// One-time token allowing the exporter to register its own machine.
    ///
    /// When set, login and password become optional: a fresh identity is
    /// registered on first use if the supplied one does not work.
    #[arg(long, env = "CROWDSEC_EXPORTER_CROWDSEC_REGISTRATION_TOKEN", hide_env_values = true)]
    pub crowdsec_registration_token: Option<String>,

    /// Machine name used for self-registration. Defaults to the hostname.
    #[arg(long, env = "CROWDSEC_EXPORTER_CROWDSEC_MACHINE_NAME")]
    pub crowdsec_machine_name: Option<String>,

    /// Delete a self-registered machine on shutdown.
    ///
    /// # Command Line
    /// This is a boolean flag that doesn't take a value; its presence enables the feature
    #[arg(long, env = "CROWDSEC_EXPORTER_CROWDSEC_DEREGISTER_ON_EXIT", action = clap::ArgAction::SetTrue)]
    pub crowdsec_deregister_on_exit: bool,

    /// Address to serve metrics on; `:9090` listens on all interfaces.
    #[arg(long, env = "CROWDSEC_EXPORTER_LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    #[arg(long, env = "CROWDSEC_EXPORTER_METRICS_PATH")]
    pub metrics_path: Option<String>,

    /// Upper bound on one scrape; past it the previous snapshot is served.
    #[arg(long, env = "CROWDSEC_EXPORTER_SCRAPE_TIMEOUT_SECS")]
    pub scrape_timeout_secs: Option<u64>,

    /// Value of the `instance` label.
    #[arg(long, env = "CROWDSEC_EXPORTER_INSTANCE_NAME")]
    pub instance_name: Option<String>,

    #[arg(long, value_enum, env = "CROWDSEC_EXPORTER_MODE")]
    pub mode: Option<ExporterMode>,

    /// Maximum number of alerts requested per scrape.
    #[arg(long, env = "CROWDSEC_EXPORTER_ALERT_LIMIT")]
    pub alert_limit: Option<usize>,

    /// Extra attempts after a failed upstream request.
    #[arg(long, env = "CROWDSEC_EXPORTER_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// How the `duration` label is derived.
    #[arg(long, value_enum, env = "CROWDSEC_EXPORTER_DURATION_STRATEGY")]
    pub duration_strategy: Option<DurationStrategy>,

    #[arg(long, value_enum, env = "CROWDSEC_EXPORTER_RETRY_BACKOFF")]
    pub retry_backoff: Option<BackoffKind>,

    #[arg(long, env = "CROWDSEC_EXPORTER_RETRY_BASE_MS")]
    pub retry_base_ms: Option<u64>,

    #[arg(long, env = "CROWDSEC_EXPORTER_RETRY_MAX_MS")]
    pub retry_max_ms: Option<u64>,

    #[arg(long, value_enum, env = "CROWDSEC_EXPORTER_LOG_LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrowdsecConfig {
    pub url: String,
    /// Resolved machine id: the login, else the machine name, else the hostname.
    pub login: String,
    pub password: String,
    pub registration_token: Option<String>,
    pub deregister_on_exit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
    pub metrics_path: String,
    pub scrape_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    pub instance_name: String,
    pub mode: ExporterMode,
    pub alert_limit: usize,
    pub max_retries: u32,
    pub duration_strategy: DurationStrategy,
    pub retry: RetryPolicy,
}

/// Validated runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub crowdsec: CrowdsecConfig,
    pub server: ServerConfig,
    pub exporter: ExporterConfig,
    pub log_level: LogLevel,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))
    }
}

impl Config {
    /// Reads the configuration file named by `args` (if any) and merges it
    /// under the arguments.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::from_path(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    pub fn resolve(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let FileConfig {
            crowdsec,
            server,
            exporter,
            log_level,
        } = file;

        let url = non_empty(args.crowdsec_url)
            .or(non_empty(crowdsec.url))
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let login = non_empty(args.crowdsec_login).or(non_empty(crowdsec.login));
        let password = non_empty(args.crowdsec_password).or(non_empty(crowdsec.password));
        let registration_token =
            non_empty(args.crowdsec_registration_token).or(non_empty(crowdsec.registration_token));
        let machine_name = non_empty(args.crowdsec_machine_name).or(non_empty(crowdsec.machine_name));

        validate_url(&url)?;
        if registration_token.is_none() {
            if login.is_none() {
                return Err(ConfigError::MissingField(
                    "crowdsec.login is required without a registration token".to_string(),
                ));
            }
            if password.is_none() {
                return Err(ConfigError::MissingField(
                    "crowdsec.password is required without a registration token".to_string(),
                ));
            }
        }

        let crowdsec = CrowdsecConfig {
            url,
            login: login
                .or(machine_name)
                .or_else(hostname)
                .unwrap_or_else(generated_machine_name),
            password: password.unwrap_or_default(),
            registration_token,
            deregister_on_exit: args.crowdsec_deregister_on_exit
                || crowdsec.deregister_on_exit.unwrap_or(false),
        };

        let listen_address = args
            .listen_address
            .or(server.listen_address)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string());
        let metrics_path = args
            .metrics_path
            .or(server.metrics_path)
            .unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string());
        validate_metrics_path(&metrics_path)?;
        let scrape_timeout_secs = args
            .scrape_timeout_secs
            .or(server.scrape_timeout_secs)
            .unwrap_or(DEFAULT_SCRAPE_TIMEOUT_SECS);
        if scrape_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "server.scrape_timeout_secs must be greater than zero".to_string(),
            ));
        }
        let server = ServerConfig {
            listen_address: parse_listen_address(&listen_address)?,
            metrics_path,
            scrape_timeout: Duration::from_secs(scrape_timeout_secs),
        };

        let retry = retry_policy(
            args.retry_backoff.or(exporter.retry_backoff).unwrap_or_default(),
            args.retry_base_ms
                .or(exporter.retry_base_ms)
                .unwrap_or(DEFAULT_RETRY_BASE_MS),
            args.retry_max_ms
                .or(exporter.retry_max_ms)
                .unwrap_or(DEFAULT_RETRY_MAX_MS),
        )?;
        let exporter = ExporterConfig {
            instance_name: non_empty(args.instance_name)
                .or(non_empty(exporter.instance_name))
                .unwrap_or_else(|| DEFAULT_INSTANCE_NAME.to_string()),
            mode: args.mode.or(exporter.mode).unwrap_or_default(),
            alert_limit: args
                .alert_limit
                .or(exporter.alert_limit)
                .unwrap_or(DEFAULT_ALERT_LIMIT),
            max_retries: args
                .max_retries
                .or(exporter.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            duration_strategy: args
                .duration_strategy
                .or(exporter.duration_strategy)
                .unwrap_or_default(),
            retry,
        };

        Ok(Config {
            crowdsec,
            server,
            exporter,
            log_level: args.log_level.or(log_level).unwrap_or_default(),
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint: self.crowdsec.url.clone(),
            machine_id: self.crowdsec.login.clone(),
            machine_secret: self.crowdsec.password.clone(),
            registration_token: self.crowdsec.registration_token.clone(),
            deregister_on_exit: self.crowdsec.deregister_on_exit,
        }
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            instance_name: self.exporter.instance_name.clone(),
            mode: self.exporter.mode,
            alert_limit: self.exporter.alert_limit,
            max_retries: self.exporter.max_retries,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(format!(
            "crowdsec.url must start with http:// or https://, got {:?}",
            url
        )))
    }
}

fn validate_metrics_path(path: &str) -> Result<(), ConfigError> {
    if !path.starts_with('/') || path == "/" {
        return Err(ConfigError::InvalidValue(format!(
            "server.metrics_path must start with '/' and not be the root, got {:?}",
            path
        )));
    }
    Ok(())
}

/// Accepts `host:port` or the `:port` shorthand for all interfaces.
pub fn parse_listen_address(raw: &str) -> Result<SocketAddr, ConfigError> {
    let candidate = if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    };
    candidate.parse().map_err(|_| {
        ConfigError::InvalidValue(format!("server.listen_address {:?} is not a socket address", raw))
    })
}

fn retry_policy(kind: BackoffKind, base_ms: u64, max_ms: u64) -> Result<RetryPolicy, ConfigError> {
    let backoff = match kind {
        BackoffKind::None => Backoff::None,
        BackoffKind::Fixed => Backoff::Fixed(Duration::from_millis(base_ms)),
        BackoffKind::Exponential => {
            if base_ms > max_ms {
                return Err(ConfigError::InvalidValue(format!(
                    "exporter.retry_base_ms ({}) exceeds exporter.retry_max_ms ({})",
                    base_ms, max_ms
                )));
            }
            Backoff::Exponential {
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(max_ms),
                jitter: true,
            }
        }
    };
    Ok(RetryPolicy::new(backoff))
}

fn hostname() -> Option<String> {
    non_empty(std::env::var("HOSTNAME").ok())
        .or_else(|| non_empty(fs::read_to_string("/etc/hostname").ok()))
        .map(|name| name.trim().to_string())
}

fn generated_machine_name() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("crowdsec-exporter-{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["crowdsec-exporter"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap_or_else(|e| panic!("{}", e))
    }

    fn operator_args() -> Args {
        parse(&["--crowdsec-login", "exporter", "--crowdsec-password", "pw"])
    }

    #[test]
    #[serial]
    fn defaults_apply() {
        let config = Config::resolve(operator_args(), FileConfig::default()).unwrap();

        assert_eq!(config.crowdsec.url, "http://localhost:8080");
        assert_eq!(config.crowdsec.login, "exporter");
        assert!(!config.crowdsec.deregister_on_exit);
        assert_eq!(config.server.listen_address, "0.0.0.0:9090".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.metrics_path, "/metrics");
        assert_eq!(config.server.scrape_timeout, Duration::from_secs(30));
        assert_eq!(config.exporter.instance_name, "crowdsec");
        assert_eq!(config.exporter.mode, ExporterMode::Alerts);
        assert_eq!(config.exporter.alert_limit, 1000);
        assert_eq!(config.exporter.max_retries, 5);
        assert_eq!(config.exporter.duration_strategy, DurationStrategy::Remaining);
        assert_eq!(config.exporter.retry, RetryPolicy::default());
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    #[serial]
    fn file_values_fill_in_and_flags_win() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
log_level = "debug"

[crowdsec]
url = "https://lapi.internal:8080"
login = "from-file"
password = "file-pw"
deregister_on_exit = true

[server]
listen_address = "127.0.0.1:9100"
scrape_timeout_secs = 5

[exporter]
mode = "stream"
duration_strategy = "window"
retry_backoff = "fixed"
retry_base_ms = 250
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let args = parse(&["--config", path, "--crowdsec-login", "from-flag", "--max-retries", "2"]);
        let config = Config::load(args).unwrap();

        assert_eq!(config.crowdsec.url, "https://lapi.internal:8080");
        assert_eq!(config.crowdsec.login, "from-flag");
        assert_eq!(config.crowdsec.password, "file-pw");
        assert!(config.crowdsec.deregister_on_exit);
        assert_eq!(config.server.listen_address, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
        assert_eq!(config.server.scrape_timeout, Duration::from_secs(5));
        assert_eq!(config.exporter.mode, ExporterMode::Stream);
        assert_eq!(config.exporter.duration_strategy, DurationStrategy::Window);
        assert_eq!(config.exporter.max_retries, 2);
        assert_eq!(
            config.exporter.retry,
            RetryPolicy::new(Backoff::Fixed(Duration::from_millis(250)))
        );
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    #[serial]
    fn credentials_required_without_registration_token() {
        let missing_password = parse(&["--crowdsec-login", "exporter"]);
        assert!(matches!(
            Config::resolve(missing_password, FileConfig::default()),
            Err(ConfigError::MissingField(_))
        ));
        assert!(matches!(
            Config::resolve(Args::default(), FileConfig::default()),
            Err(ConfigError::MissingField(_))
        ));
    }

    #[test]
    #[serial]
    fn registration_token_defaults_login_to_machine_name() {
        let args = parse(&[
            "--crowdsec-registration-token",
            "reg",
            "--crowdsec-machine-name",
            "edge-7",
        ]);
        let config = Config::resolve(args, FileConfig::default()).unwrap();

        assert_eq!(config.crowdsec.login, "edge-7");
        assert_eq!(config.crowdsec.password, "");
        let session = config.session_config();
        assert_eq!(session.machine_id, "edge-7");
        assert_eq!(session.registration_token.as_deref(), Some("reg"));
    }

    #[test]
    #[serial]
    fn rejects_invalid_values() {
        let cases: [&[&str]; 5] = [
            &["--crowdsec-url", "lapi:8080"],
            &["--metrics-path", "/"],
            &["--metrics-path", "metrics"],
            &["--listen-address", "not-an-address"],
            &["--scrape-timeout-secs", "0"],
        ];
        for extra in cases {
            let mut argv = vec!["--crowdsec-login", "l", "--crowdsec-password", "p"];
            argv.extend_from_slice(extra);
            let result = Config::resolve(parse(&argv), FileConfig::default());
            assert!(
                matches!(result, Err(ConfigError::InvalidValue(_))),
                "{:?} should be rejected",
                extra
            );
        }
    }

    #[test]
    #[serial]
    fn exponential_base_may_not_exceed_max() {
        let args = parse(&[
            "--crowdsec-login",
            "l",
            "--crowdsec-password",
            "p",
            "--retry-base-ms",
            "5000",
            "--retry-max-ms",
            "10",
        ]);
        assert!(matches!(
            Config::resolve(args, FileConfig::default()),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn unknown_keys_and_bad_enums_fail_to_parse() {
        assert!(matches!(
            FileConfig::from_toml("[crowdsec]\nurl_typo = \"x\"\n"),
            Err(ConfigError::TomlError(_))
        ));
        assert!(matches!(
            FileConfig::from_toml("log_level = \"verbose\"\n"),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    #[serial]
    fn missing_config_file_is_an_io_error() {
        let args = parse(&["--config", "/nonexistent/crowdsec-exporter.toml"]);
        assert!(matches!(Config::load(args), Err(ConfigError::IoError(_))));
    }

    #[test]
    fn listen_address_shorthand() {
        assert_eq!(parse_listen_address(":9090").unwrap(), "0.0.0.0:9090".parse::<SocketAddr>().unwrap());
        assert_eq!(parse_listen_address("[::1]:9090").unwrap(), "[::1]:9090".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn generated_names_are_prefixed() {
        let name = generated_machine_name();
        assert!(name.starts_with("crowdsec-exporter-"));
        assert_eq!(name.len(), "crowdsec-exporter-".len() + 8);
    }

    #[test]
    #[serial]
    fn environment_variables_are_read() {
        std::env::set_var("CROWDSEC_EXPORTER_CROWDSEC_URL", "https://from-env:8080");
        std::env::set_var("CROWDSEC_EXPORTER_MODE", "stream");
        let args = operator_args();
        std::env::remove_var("CROWDSEC_EXPORTER_CROWDSEC_URL");
        std::env::remove_var("CROWDSEC_EXPORTER_MODE");

        let config = Config::resolve(args, FileConfig::default()).unwrap();
        assert_eq!(config.crowdsec.url, "https://from-env:8080");
        assert_eq!(config.exporter.mode, ExporterMode::Stream);
    }

    #[test]
    #[serial]
    fn hostname_is_the_last_named_fallback() {
        let previous = std::env::var("HOSTNAME").ok();
        std::env::set_var("HOSTNAME", "edge-host");
        let args = parse(&["--crowdsec-registration-token", "reg"]);
        let config = Config::resolve(args, FileConfig::default()).unwrap();
        match previous {
            Some(name) => std::env::set_var("HOSTNAME", name),
            None => std::env::remove_var("HOSTNAME"),
        }

        assert_eq!(config.crowdsec.login, "edge-host");
    }
}
