use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error_handling::types::AuthError;
use crate::lapi::transport::{endpoint_url, LapiTransport};
use crate::models::decision::parse_timestamp;
use crate::normalization::LooseRecord;
use crate::session_management::credentials::{generate_secret, is_already_registered};
use crate::session_management::session::{Session, SessionConfig, SessionView};
use crate::session_management::SessionState;

/// Lifetime assumed for a token whose `expire` field is absent or unparseable.
const FALLBACK_TOKEN_LIFETIME: TimeDelta = TimeDelta::hours(1);

#[derive(Serialize)]
struct LoginRequest<'a> {
    machine_id: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegistrationRequest<'a> {
    machine_id: &'a str,
    password: &'a str,
    registration_token: &'a str,
}

struct TokenGrant {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Owner of the authenticated identity used for every LAPI call.
///
/// A single lock guards the whole [`Session`] and is held for the full
/// duration of [`ensure_authenticated`], network calls included, so that
/// overlapping scrapes never register or log in twice.
///
/// # Fields Overview
///
/// - `session`: the mutable session record
/// - `transport`: JSON transport shared with the upstream client
/// - `clock`: time source for token expiry
///
/// [`ensure_authenticated`]: SessionManager::ensure_authenticated
pub struct SessionManager {
    session: Mutex<Session>,
    transport: LapiTransport,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(transport: LapiTransport, clock: Arc<dyn Clock>) -> Self {
        let session = Session::unconfigured(clock.now());
        Self {
            session: Mutex::new(session),
            transport,
            clock,
        }
    }

    /// Resets all session state to the given credentials.
    ///
    /// Without a registration token the credentials are assumed valid on the
    /// remote side; with one, the next [`ensure_authenticated`] registers first.
    ///
    /// [`ensure_authenticated`]: SessionManager::ensure_authenticated
    pub async fn configure(&self, config: SessionConfig) {
        let mut session = self.session.lock().await;
        *session = Session::configured(config, self.clock.now());
        debug!(
            "session configured for machine {} (self-registration: {})",
            session.machine_id, !session.registered
        );
    }

    /// Makes sure a registered identity and a non-expired token are held.
    ///
    /// On error no token may be used; the next call starts over.
    pub async fn ensure_authenticated(&self) -> Result<(), AuthError> {
        let mut session = self.session.lock().await;
        if session.state == SessionState::Unconfigured {
            return Err(AuthError::NotConfigured);
        }

        debug!(
            "ensure_authenticated: registered={} has_registration_token={} token_valid={}",
            session.registered,
            !session.registration_token.is_empty(),
            session.token_valid(self.clock.now())
        );

        if !session.registered && !session.registration_token.is_empty() {
            session.state = SessionState::Registering;
            if let Err(e) = self.register(&mut session).await {
                session.state = SessionState::Configured;
                return Err(e);
            }
        }

        if !session.token_valid(self.clock.now()) {
            session.state = SessionState::Authenticating;
            if let Err(e) = self.login(&mut session).await {
                session.state = SessionState::Configured;
                return Err(e);
            }
        }

        session.state = SessionState::Ready;
        Ok(())
    }

    /// Cached bearer token; empty before the first successful authentication.
    pub async fn current_token(&self) -> String {
        self.session.lock().await.bearer_token.clone()
    }

    pub async fn endpoint(&self) -> String {
        self.session.lock().await.endpoint.clone()
    }

    pub async fn view(&self) -> SessionView {
        self.session.lock().await.view()
    }

    /// Deregisters a self-registered identity when the deployment opted in.
    ///
    /// A failed deregistration call is logged and swallowed; only a failed
    /// re-authentication before it is returned.
    pub async fn release(&self) -> Result<(), AuthError> {
        let mut session = self.session.lock().await;
        if !session.deregister_on_exit {
            debug!("deregistration disabled");
            return Ok(());
        }
        if !session.self_registered || session.machine_id.is_empty() {
            debug!("no self-registered identity to release");
            return Ok(());
        }

        if !session.token_valid(self.clock.now()) {
            self.login(&mut session).await?;
        }

        let url = endpoint_url(
            &session.endpoint,
            &format!("/v1/watchers/{}", session.machine_id),
        );
        match self.transport.delete(&url, Some(&session.bearer_token)).await {
            Ok(response) if response.status == 200 || response.status == 204 => {
                info!("deregistered machine {}", session.machine_id);
                session.clear_registration(self.clock.now());
            }
            Ok(response) => warn!(
                "deregister failed: status={} machine_id={} body={}",
                response.status, session.machine_id, response.body
            ),
            Err(e) => warn!(
                "deregister request failed for machine {}: {}",
                session.machine_id, e
            ),
        }
        Ok(())
    }

    /// Probes the current credentials, registering a fresh identity when the
    /// probe fails.
    async fn register(&self, session: &mut Session) -> Result<(), AuthError> {
        if !session.machine_secret.is_empty() {
            debug!("checking if machine {} is already registered", session.machine_id);
            match self
                .request_token(&session.endpoint, &session.machine_id, &session.machine_secret)
                .await
            {
                Ok(grant) => {
                    info!(
                        "machine {} already registered and accessible",
                        session.machine_id
                    );
                    session.registered = true;
                    session.bearer_token = grant.token;
                    session.expires_at = grant.expires_at;
                    return Ok(());
                }
                Err(e) => debug!("registration probe failed: {}", e),
            }
        }

        let secret = generate_secret();
        let payload = RegistrationRequest {
            machine_id: &session.machine_id,
            password: &secret,
            registration_token: &session.registration_token,
        };
        debug!("attempting registration of machine {}", session.machine_id);
        let response = self
            .transport
            .post_json(&endpoint_url(&session.endpoint, "/v1/watchers"), &payload, None)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        match response.status {
            201 | 202 => info!("registered machine {}", session.machine_id),
            403 if is_already_registered(&response.body) => info!(
                "machine {} already exists, proceeding with submitted credentials",
                session.machine_id
            ),
            status => {
                return Err(AuthError::RegistrationRejected {
                    status,
                    body: response.body,
                })
            }
        }

        session.machine_secret = secret;
        session.registered = true;
        session.self_registered = true;
        session.bearer_token.clear();
        session.expires_at = self.clock.now();
        Ok(())
    }

    async fn login(&self, session: &mut Session) -> Result<(), AuthError> {
        debug!("authenticating machine {}", session.machine_id);
        let grant = self
            .request_token(&session.endpoint, &session.machine_id, &session.machine_secret)
            .await?;
        session.bearer_token = grant.token;
        session.expires_at = grant.expires_at;
        debug!(
            "authenticated machine {}, token valid until {}",
            session.machine_id,
            session.expires_at.to_rfc3339()
        );
        Ok(())
    }

    async fn request_token(
        &self,
        endpoint: &str,
        machine_id: &str,
        password: &str,
    ) -> Result<TokenGrant, AuthError> {
        let payload = LoginRequest {
            machine_id,
            password,
        };
        let response = self
            .transport
            .post_json(&endpoint_url(endpoint, "/v1/watchers/login"), &payload, None)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        if !response.is_success() {
            return Err(AuthError::LoginRejected {
                status: response.status,
                body: response.body,
            });
        }

        let body: Value =
            serde_json::from_str(&response.body).map_err(|e| AuthError::Decode(e.to_string()))?;
        let record = LooseRecord::from_value(&body)
            .ok_or_else(|| AuthError::Decode("login response is not an object".to_string()))?;
        let token = record.str_field("token");
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        Ok(TokenGrant {
            token: token.to_string(),
            expires_at: parse_expire(record.str_field("expire"), self.clock.now()),
        })
    }
}

/// RFC3339 `expire`; an absent or unparseable value means one hour from now.
fn parse_expire(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    if raw.is_empty() {
        return now + FALLBACK_TOKEN_LIFETIME;
    }
    match parse_timestamp(raw) {
        Some(expires_at) => expires_at,
        None => {
            warn!("unparseable token expiry {:?}, assuming one hour", raw);
            now + FALLBACK_TOKEN_LIFETIME
        }
    }
}
