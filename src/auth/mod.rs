//! Session claims, credential exchange, and role-based access control.
//!
//! ## Flow
//!
//! 1. [`exchange::CredentialExchange`] trades an identifier and secret for
//!    [`claims::SessionClaims`] at the external identity store, provisioning a
//!    default profile on first sign-in.
//! 2. [`token::SessionIssuer`] signs the claims into a stateless token that
//!    travels in the `coursegate_session` cookie.
//! 3. [`gate::route_gate`] reads the token on every request and allows,
//!    redirects to `/login`, or redirects to the role home.
//! 4. [`guard::RoleGuard`] picks what a page renders from the resolved session.
//!
//! The role is frozen into the token when it is issued. Profile changes in the
//! CMS are only visible after the user signs in again.

pub mod access;
pub mod claims;
pub mod error;
pub mod exchange;
pub mod gate;
pub mod guard;
pub mod policy;
pub mod role;
pub mod session;
pub mod token;

use self::{exchange::CredentialExchange, policy::ProtectedRoutePolicy, token::SessionIssuer};
use std::sync::Arc;

pub use self::error::AuthError;

pub const LOGIN_PATH: &str = "/login";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: token::DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Shared, read-only auth wiring handed to handlers and the gate.
#[derive(Debug)]
pub struct AuthState {
    config: AuthConfig,
    issuer: SessionIssuer,
    policy: Arc<ProtectedRoutePolicy>,
    exchange: CredentialExchange,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        issuer: SessionIssuer,
        policy: Arc<ProtectedRoutePolicy>,
        exchange: CredentialExchange,
    ) -> Self {
        Self {
            config,
            issuer,
            policy,
            exchange,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn issuer(&self) -> &SessionIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn policy(&self) -> &ProtectedRoutePolicy {
        &self.policy
    }

    #[must_use]
    pub fn exchange(&self) -> &CredentialExchange {
        &self.exchange
    }
}
