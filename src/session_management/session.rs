use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session_management::SessionState;

/// Parameters handed to [`SessionManager::configure`].
///
/// [`SessionManager::configure`]: crate::session_management::SessionManager::configure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    /// Base URL of the local API, e.g. `http://localhost:8080`.
    pub endpoint: String,
    pub machine_id: String,
    pub machine_secret: String,
    /// When set, the identity is registered on first use.
    pub registration_token: Option<String>,
    /// Deregister a self-registered identity on `release`.
    pub deregister_on_exit: bool,
}

/// Mutable session record. Only ever accessed under the manager's lock.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: SessionState,
    pub endpoint: String,
    pub bearer_token: String,
    /// The token is invalid at or after this instant.
    pub expires_at: DateTime<Utc>,
    pub registered: bool,
    /// The current identity was created by this process's registration call.
    pub self_registered: bool,
    pub machine_id: String,
    pub machine_secret: String,
    pub registration_token: String,
    pub deregister_on_exit: bool,
}

impl Session {
    pub fn unconfigured(now: DateTime<Utc>) -> Self {
        Self {
            state: SessionState::Unconfigured,
            endpoint: String::new(),
            bearer_token: String::new(),
            expires_at: now,
            registered: false,
            self_registered: false,
            machine_id: String::new(),
            machine_secret: String::new(),
            registration_token: String::new(),
            deregister_on_exit: false,
        }
    }

    pub fn configured(config: SessionConfig, now: DateTime<Utc>) -> Self {
        let registration_token = config.registration_token.unwrap_or_default();
        Self {
            state: SessionState::Configured,
            endpoint: config.endpoint,
            bearer_token: String::new(),
            expires_at: now,
            registered: registration_token.is_empty(),
            self_registered: false,
            machine_id: config.machine_id,
            machine_secret: config.machine_secret,
            registration_token,
            deregister_on_exit: config.deregister_on_exit,
        }
    }

    pub fn token_valid(&self, now: DateTime<Utc>) -> bool {
        !self.bearer_token.is_empty() && now < self.expires_at
    }

    pub fn clear_registration(&mut self, now: DateTime<Utc>) {
        self.registered = false;
        self.self_registered = false;
        self.machine_id.clear();
        self.machine_secret.clear();
        self.bearer_token.clear();
        self.expires_at = now;
        self.state = SessionState::Configured;
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state,
            machine_id: self.machine_id.clone(),
            registered: self.registered,
            self_registered: self.self_registered,
            has_token: !self.bearer_token.is_empty(),
            expires_at: self.expires_at,
        }
    }
}

/// Read-only view of the session, without secrets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub state: SessionState,
    pub machine_id: String,
    pub registered: bool,
    pub self_registered: bool,
    pub has_token: bool,
    pub expires_at: DateTime<Utc>,
}
