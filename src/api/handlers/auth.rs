//! Sign-in, sign-out, session and registration endpoints.
//!
//! Flow Overview:
//! 1) `POST /api/auth/login` runs the credential exchange, signs the claims and
//!    sets the session cookie.
//! 2) `GET /api/auth/session` reports the claims carried by the cookie.
//! 3) `POST /api/auth/logout` expires the cookie; the token itself stays valid
//!    until it expires.
//! 4) `POST /api/auth/register` forwards to the identity store and never signs
//!    the user in.

use crate::auth::{
    access::MaybeSession,
    claims::Profile,
    exchange::{Registration, StoreError},
    role::{Role, GENERIC_HOME},
    session::{clear_session_cookie, session_cookie},
    AuthState, LOGIN_PATH,
};
use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use url::form_urlencoded;
use utoipa::ToSchema;

pub const REGISTRATION_MESSAGE: &str = "Registration successful! Please sign in.";

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(alias = "identifier")]
    pub email: String,
    pub password: String,
    #[serde(default, alias = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub redirect_to: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub profile: Option<Profile>,
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub redirect_to: String,
}

/// Only same-origin paths are honored as post-login targets.
#[must_use]
pub fn local_redirect(callback_url: Option<&str>) -> String {
    match callback_url.map(str::trim) {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.contains('\\') => {
            url.to_string()
        }
        _ => GENERIC_HOME.to_string(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in, session cookie set", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let password = SecretString::from(request.password);
    let claims = match auth_state
        .exchange()
        .exchange(&request.email, &password)
        .await
    {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let token = match auth_state.issuer().issue(&claims) {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to sign session token: {err}");
            return err.into_response();
        }
    };

    let config = auth_state.config();
    let cookie = match session_cookie(
        &token,
        config.session_ttl_seconds(),
        config.session_cookie_secure(),
    ) {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(user_id = claims.subject_id(), role = %claims.role(), "signed in");

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    let body = LoginResponse {
        user_id: claims.subject_id().to_string(),
        email: claims.email().to_string(),
        name: claims.preferred_name().to_string(),
        role: claims.role(),
        redirect_to: local_redirect(request.callback_url.as_deref()),
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session cookie cleared"),
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> Response {
    match clear_session_cookie(auth_state.config().session_cookie_secure()) {
        Ok(cookie) => {
            let mut headers = HeaderMap::new();
            headers.insert(SET_COOKIE, cookie);
            (StatusCode::NO_CONTENT, headers).into_response()
        }
        Err(err) => {
            error!("Failed to build logout cookie: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Current session claims", body = SessionResponse),
        (status = 204, description = "No active session"),
    ),
    tag = "auth"
)]
pub async fn session(MaybeSession(claims): MaybeSession) -> Response {
    let Some(claims) = claims else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let body = SessionResponse {
        user_id: claims.subject_id().to_string(),
        email: claims.email().to_string(),
        name: claims.preferred_name().to_string(),
        role: claims.role(),
        profile: claims.profile().cloned(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, sign in next", body = RegisterResponse),
        (status = 400, description = "Rejected by the identity store"),
        (status = 502, description = "Identity store unavailable"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(
    auth_state: Extension<Arc<AuthState>>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    let registration = Registration {
        username: request.username.trim().to_string(),
        email: request.email.trim().to_string(),
        password: SecretString::from(request.password),
    };

    match auth_state.exchange().register(&registration).await {
        Ok(()) => {
            let message: String =
                form_urlencoded::byte_serialize(REGISTRATION_MESSAGE.as_bytes()).collect();
            let body = RegisterResponse {
                message: REGISTRATION_MESSAGE.to_string(),
                redirect_to: format!("{LOGIN_PATH}?message={message}"),
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(StoreError::Rejected(message)) => {
            warn!("registration rejected: {message}");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        Err(err) => {
            error!("registration failed: {err}");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Registration failed" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_redirect_targets() {
        assert_eq!(local_redirect(Some("/student/42")), "/student/42");
        assert_eq!(local_redirect(Some("/dev?tab=logs")), "/dev?tab=logs");
        assert_eq!(local_redirect(Some("//evil.example.com")), "/dashboard");
        assert_eq!(local_redirect(Some("https://evil.example.com")), "/dashboard");
        assert_eq!(local_redirect(Some("/\\evil.example.com")), "/dashboard");
        assert_eq!(local_redirect(None), "/dashboard");
    }
}
