//! Session management core module.
//!
//! This module owns the authenticated identity used for every LAPI call: the
//! bearer token, its expiry, and the self-registration state machine.

use serde::Serialize;

/// Submodule for credential generation helpers.
pub mod credentials;
/// Submodule for session data structures.
pub mod session;
/// Submodule for session manager implementation.
pub mod session_manager;

pub use session::{Session, SessionConfig, SessionView};
pub use session_manager::SessionManager;

/// Lifecycle of the session.
///
/// Variants:
/// - `Unconfigured`: `configure` was never called.
/// - `Configured`: credentials are known, no valid token is held.
/// - `Registering`: a self-registration exchange is in flight.
/// - `Authenticating`: a login exchange is in flight.
/// - `Ready`: a token is held; it re-enters `Authenticating` once expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unconfigured,
    Configured,
    Registering,
    Authenticating,
    Ready,
}
