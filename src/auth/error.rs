use super::role::{join_roles, Role};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message shown for every failed sign-in, whatever the cause.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("profile provisioning failed: {0}")]
    ProfileProvisioningFailed(String),
    #[error("session token could not be decoded")]
    TokenDecodeFailed,
    #[error("identity store unreachable: {0}")]
    Transport(String),
    #[error("access denied for {role}, required roles: {}", join_roles(.allowed))]
    Forbidden { role: Role, allowed: Vec<Role> },
    #[error("session expiry out of range (ttl {0} seconds)")]
    ExpiryOutOfRange(i64),
    #[error("failed to sign session token")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            // Transport failures are reported like bad credentials on purpose.
            Self::InvalidCredentials | Self::Transport(_) | Self::TokenDecodeFailed => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::ProfileProvisioningFailed(_) | Self::ExpiryOutOfRange(_) | Self::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the end user.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidCredentials | Self::Transport(_) | Self::TokenDecodeFailed => {
                INVALID_CREDENTIALS_MESSAGE.to_string()
            }
            Self::Forbidden { .. } => self.to_string(),
            Self::ProfileProvisioningFailed(_) | Self::ExpiryOutOfRange(_) | Self::Token(_) => {
                "Authentication failed".to_string()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}
