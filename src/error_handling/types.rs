use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    MissingField(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::MissingField(e) => write!(f, "Missing configuration value: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Credential, login or registration failure.
///
/// Terminal for the current collection cycle only: the next cycle starts the
/// authentication from scratch.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    NotConfigured,
    Transport(String),
    LoginRejected { status: u16, body: String },
    RegistrationRejected { status: u16, body: String },
    Decode(String),
    EmptyToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotConfigured => write!(f, "Session manager is not configured"),
            AuthError::Transport(e) => write!(f, "Authentication transport error: {}", e),
            AuthError::LoginRejected { status, body } => {
                write!(f, "Login rejected: status={} body={}", status, body)
            }
            AuthError::RegistrationRejected { status, body } => {
                write!(f, "Registration rejected: status={} body={}", status, body)
            }
            AuthError::Decode(e) => write!(f, "Login response decode error: {}", e),
            AuthError::EmptyToken => write!(f, "Login response carried an empty token"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Top-level payload that is not the expected JSON shape.
///
/// A single malformed field never escalates to this.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    InvalidJson(String),
    UnexpectedShape(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidJson(e) => write!(f, "Invalid JSON payload: {}", e),
            DecodeError::UnexpectedShape(e) => write!(f, "Unexpected payload shape: {}", e),
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    Auth(AuthError),
    /// Retries exhausted; carries the last HTTP status, if a response was received.
    Upstream { status: Option<u16>, message: String },
    Decode(DecodeError),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Auth(e) => write!(f, "Authentication error: {}", e),
            FetchError::Upstream {
                status: Some(status),
                message,
            } => write!(f, "Upstream error: status={} {}", status, message),
            FetchError::Upstream {
                status: None,
                message,
            } => write!(f, "Upstream error: {}", message),
            FetchError::Decode(e) => write!(f, "Decode error: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<AuthError> for FetchError {
    fn from(err: AuthError) -> Self {
        FetchError::Auth(err)
    }
}

impl From<DecodeError> for FetchError {
    fn from(err: DecodeError) -> Self {
        FetchError::Decode(err)
    }
}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
    EncodingFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
            WebError::EncodingFailed(e) => write!(f, "Metrics encoding failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    Config(ConfigError),
    HttpClient(String),
    Web(WebError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::Config(e) => write!(f, "Configuration error: {}", e),
            ControllerError::HttpClient(e) => write!(f, "HTTP client setup failed: {}", e),
            ControllerError::Web(e) => write!(f, "Web server error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::Config(err)
    }
}

impl From<WebError> for ControllerError {
    fn from(err: WebError) -> Self {
        ControllerError::Web(err)
    }
}
