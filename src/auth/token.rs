//! Signed, stateless session tokens.
//!
//! The token is an HS256 JWT whose payload is the full [`SessionClaims`]
//! snapshot plus the registered `iss`, `iat`, `exp` and `jti` claims. Nothing is
//! stored server-side: a token is valid until it expires or the client drops
//! it.

use super::{claims::SessionClaims, error::AuthError};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use ulid::Ulid;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
pub const DEFAULT_ISSUER: &str = "coursegate";

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    iss: String,
    iat: i64,
    exp: i64,
    jti: String,
    #[serde(flatten)]
    session: SessionClaims,
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl_seconds: i64,
}

impl fmt::Debug for SessionIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIssuer")
            .field("keys", &"***")
            .field("issuer", &self.issuer)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: DEFAULT_ISSUER.to_string(),
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Mint a token for the given claims, valid for the configured TTL.
    ///
    /// # Errors
    /// Returns an error if the expiry overflows or the payload cannot be
    /// encoded or signed.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        self.issue_at(claims, Utc::now().timestamp())
    }

    pub(crate) fn issue_at(&self, claims: &SessionClaims, now: i64) -> Result<String, AuthError> {
        let exp = now
            .checked_add(self.ttl_seconds)
            .ok_or(AuthError::ExpiryOutOfRange(self.ttl_seconds))?;
        let payload = TokenPayload {
            iss: self.issuer.clone(),
            iat: now,
            exp,
            jti: Ulid::new().to_string(),
            session: claims.clone(),
        };
        Ok(encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &self.encoding_key,
        )?)
    }

    /// Verify and decode a token.
    ///
    /// # Errors
    /// Returns `TokenDecodeFailed` for bad signatures, foreign issuers,
    /// malformed payloads and expired tokens alike.
    pub fn decode(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.leeway = 0;

        decode::<TokenPayload>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.session)
            .map_err(|err| {
                debug!("session token rejected: {err}");
                AuthError::TokenDecodeFailed
            })
    }

    /// Resolve a token into claims, `None` when it is not usable.
    #[must_use]
    pub fn resolve(&self, token: &str) -> Option<SessionClaims> {
        self.decode(token).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::Profile, role::Role};
    use serde_json::json;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new(&SecretString::from("test-secret".to_string()), 3600)
    }

    fn claims(role: Role) -> SessionClaims {
        SessionClaims::new(
            "42".to_string(),
            "ada@example.com".to_string(),
            "ada".to_string(),
            "cms-jwt".to_string(),
            Some(Profile {
                id: Some(9),
                role,
                display_name: Some("Ada".to_string()),
                avatar: None,
                enrolled_courses: vec![json!({"id": 1})],
            }),
            Some(json!({"id": 42, "username": "ada"})),
        )
    }

    #[test]
    fn issue_then_resolve_returns_same_claims() -> anyhow::Result<()> {
        let issuer = issuer();
        let original = claims(Role::Student);
        let token = issuer.issue(&original)?;
        assert_eq!(issuer.resolve(&token), Some(original));
        Ok(())
    }

    #[test]
    fn rejects_foreign_signature() -> anyhow::Result<()> {
        let token = issuer().issue(&claims(Role::Developer))?;
        let other = SessionIssuer::new(&SecretString::from("other-secret".to_string()), 3600);
        assert!(matches!(
            other.decode(&token),
            Err(AuthError::TokenDecodeFailed)
        ));
        Ok(())
    }

    #[test]
    fn rejects_foreign_issuer() -> anyhow::Result<()> {
        let token = issuer()
            .with_issuer("someone-else".to_string())
            .issue(&claims(Role::Developer))?;
        assert!(issuer().resolve(&token).is_none());
        Ok(())
    }

    #[test]
    fn rejects_expired_token() -> anyhow::Result<()> {
        let issuer = issuer();
        let long_ago = Utc::now().timestamp() - 2 * issuer.ttl_seconds();
        let token = issuer.issue_at(&claims(Role::Student), long_ago)?;
        assert!(issuer.resolve(&token).is_none());
        Ok(())
    }

    #[test]
    fn rejects_garbage() {
        assert!(issuer().resolve("not-a-token").is_none());
        assert!(issuer().resolve("").is_none());
    }

    #[test]
    fn role_is_frozen_at_issue_time() -> anyhow::Result<()> {
        // The profile is promoted in the CMS after sign-in; the old token keeps
        // reporting the old role until a new one is minted.
        let issuer = issuer();
        let stale = issuer.issue(&claims(Role::NormalUser))?;
        let promoted = claims(Role::Developer);

        assert_eq!(
            issuer.resolve(&stale).map(|claims| claims.role()),
            Some(Role::NormalUser)
        );

        let fresh = issuer.issue(&promoted)?;
        assert_eq!(
            issuer.resolve(&fresh).map(|claims| claims.role()),
            Some(Role::Developer)
        );
        Ok(())
    }

    #[test]
    fn overflowing_expiry_is_an_error() {
        let issuer = SessionIssuer::new(&SecretString::from("test-secret".to_string()), i64::MAX);
        let result = issuer.issue(&claims(Role::Student));
        assert!(matches!(result, Err(AuthError::ExpiryOutOfRange(i64::MAX))));
        assert_eq!(
            result.map_err(|err| err.status()).err(),
            Some(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
        );
    }
}
