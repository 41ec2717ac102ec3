//! Session transport and propagation.
//!
//! Server side: the token travels in an `HttpOnly` cookie (or a bearer header
//! for API clients) and is resolved on every request that needs claims.
//!
//! Client side: [`SessionWatcher`] owns the current token in a watch channel so
//! render code can subscribe and re-resolve whenever the token is replaced by
//! sign-in or cleared by sign-out.

use super::{claims::SessionClaims, token::SessionIssuer};
use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use std::sync::Arc;
use tokio::sync::watch;

pub const SESSION_COOKIE_NAME: &str = "coursegate_session";

/// Build a secure `HttpOnly` cookie for the session token.
///
/// # Errors
/// Returns an error if the token contains bytes that are not valid in a header.
pub fn session_cookie(
    token: &str,
    ttl_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build a cookie that expires the session immediately.
///
/// # Errors
/// Never fails in practice; the value is static apart from the `Secure` flag.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Read the session token from a bearer header or the session cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the claims for a request, `None` when missing or invalid.
#[must_use]
pub fn resolve_request(headers: &HeaderMap, issuer: &SessionIssuer) -> Option<SessionClaims> {
    extract_session_token(headers).and_then(|token| issuer.resolve(&token))
}

/// Session status as seen by render code.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionState {
    /// Resolution has not completed yet.
    Loading,
    Unauthenticated,
    Authenticated(SessionClaims),
}

impl SessionState {
    #[must_use]
    pub fn claims(&self) -> Option<&SessionClaims> {
        match self {
            Self::Authenticated(claims) => Some(claims),
            Self::Loading | Self::Unauthenticated => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum TokenSlot {
    Pending,
    Empty,
    Present(String),
}

/// Client-side owner of the current session token.
///
/// Starts in [`SessionState::Loading`] until the first token (or absence of
/// one) is published. Token replacement is atomic; there is no cross-session
/// locking.
#[derive(Clone, Debug)]
pub struct SessionWatcher {
    issuer: Arc<SessionIssuer>,
    slot: Arc<watch::Sender<TokenSlot>>,
}

impl SessionWatcher {
    #[must_use]
    pub fn new(issuer: Arc<SessionIssuer>) -> Self {
        let (slot, _) = watch::channel(TokenSlot::Pending);
        Self {
            issuer,
            slot: Arc::new(slot),
        }
    }

    /// Publish whatever token the client currently holds, if any.
    pub fn hydrate(&self, token: Option<String>) {
        self.slot
            .send_replace(token.map_or(TokenSlot::Empty, TokenSlot::Present));
    }

    pub fn sign_in(&self, token: String) {
        self.slot.send_replace(TokenSlot::Present(token));
    }

    pub fn sign_out(&self) {
        self.slot.send_replace(TokenSlot::Empty);
    }

    /// Current state, resolved against the latest token.
    #[must_use]
    pub fn current(&self) -> SessionState {
        let slot = self.slot.borrow().clone();
        resolve_slot(&self.issuer, &slot)
    }

    #[must_use]
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            issuer: self.issuer.clone(),
            receiver: self.slot.subscribe(),
        }
    }
}

fn resolve_slot(issuer: &SessionIssuer, slot: &TokenSlot) -> SessionState {
    match slot {
        TokenSlot::Pending => SessionState::Loading,
        TokenSlot::Empty => SessionState::Unauthenticated,
        TokenSlot::Present(token) => issuer
            .resolve(token)
            .map_or(SessionState::Unauthenticated, SessionState::Authenticated),
    }
}

/// A render-side subscription that re-resolves on every token change.
#[derive(Debug)]
pub struct SessionSubscription {
    issuer: Arc<SessionIssuer>,
    receiver: watch::Receiver<TokenSlot>,
}

impl SessionSubscription {
    #[must_use]
    pub fn current(&self) -> SessionState {
        let slot = self.receiver.borrow().clone();
        resolve_slot(&self.issuer, &slot)
    }

    /// Wait for the next token change and return the re-resolved state.
    /// Returns `None` once the watcher has been dropped.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.receiver.changed().await.ok()?;
        let slot = self.receiver.borrow_and_update().clone();
        Some(resolve_slot(&self.issuer, &slot))
    }
}
