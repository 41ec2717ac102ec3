//! Server-side role checks for handlers that serve protected data.
//!
//! The gate and the guard only steer navigation. Handlers returning protected
//! data re-validate the session role here on every call.

use super::{
    claims::SessionClaims, error::AuthError, role::Role, session::resolve_request, AuthState,
    LOGIN_PATH,
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::Redirect,
};
use serde_json::Value;
use std::sync::Arc;

pub const ADMIN: &[Role] = &[Role::Developer, Role::SocialMediaManager];
pub const STUDENT: &[Role] = &[Role::Student];
pub const ENROLLED: &[Role] = &[Role::Student, Role::SocialMediaManager, Role::Developer];
pub const AUTHENTICATED: &[Role] = &Role::ALL;
pub const DEVELOPER: &[Role] = &[Role::Developer];

/// Whether a session exists and its role is one of `allowed`.
#[must_use]
pub fn has_role(claims: Option<&SessionClaims>, allowed: &[Role]) -> bool {
    claims.is_some_and(|claims| allowed.contains(&claims.role()))
}

/// # Errors
/// Returns `Forbidden` when the session role is not in `allowed`.
pub fn require_role(claims: &SessionClaims, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&claims.role()) {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            role: claims.role(),
            allowed: allowed.to_vec(),
        })
    }
}

/// Courses listed on the session's profile, empty without a profile.
#[must_use]
pub fn enrolled_courses(claims: &SessionClaims) -> &[Value] {
    claims
        .profile()
        .map(|profile| profile.enrolled_courses.as_slice())
        .unwrap_or_default()
}

/// Extractor for handlers that need a signed-in user. Requests without a
/// usable session are redirected to the login page.
#[derive(Clone, Debug)]
pub struct Session(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // The route gate already resolved the claims for protected prefixes.
        if let Some(claims) = parts.extensions.get::<SessionClaims>() {
            return Ok(Self(claims.clone()));
        }
        parts
            .extensions
            .get::<Arc<AuthState>>()
            .and_then(|state| resolve_request(&parts.headers, state.issuer()))
            .map(Self)
            .ok_or_else(|| Redirect::temporary(LOGIN_PATH))
    }
}

/// Like [`Session`] but never rejects.
#[derive(Clone, Debug)]
pub struct MaybeSession(pub Option<SessionClaims>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            Session::from_request_parts(parts, state)
                .await
                .ok()
                .map(|Session(claims)| claims),
        ))
    }
}
