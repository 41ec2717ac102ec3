//! Credential exchange against the external identity and profile stores.
//!
//! Flow Overview: reject empty input locally, log in at the identity store,
//! fetch the caller's profile with the returned bearer credential, and when
//! the profile does not exist yet, try to create a default one. Profile
//! provisioning is best effort: sign-in still succeeds with `NormalUser` and
//! no profile when it fails.
//!
//! Provisioning writes during what is otherwise a read path, so an exchange
//! that failed to create the profile may create it on the next attempt.

use super::{
    claims::{Profile, SessionClaims},
    error::AuthError,
    role::Role,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::{future::Future, pin::Pin, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("rejected by store: {0}")]
    Rejected(String),
    #[error("not found")]
    NotFound,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },
}

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Identity record returned by a successful login.
#[derive(Clone, Debug, PartialEq)]
pub struct IdentityUser {
    pub id: String,
    pub username: String,
    pub email: String,
    /// The raw record, for fields not mirrored into the profile.
    pub raw: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoginSuccess {
    pub bearer_credential: String,
    pub user: IdentityUser,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProfile {
    pub role: Role,
    pub display_name: String,
    pub owner_id: String,
}

#[derive(Clone, Debug)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: SecretString,
}

pub trait IdentityStore: Send + Sync {
    fn login<'a>(&'a self, identifier: &'a str, secret: &'a SecretString)
        -> StoreFuture<'a, LoginSuccess>;

    fn register<'a>(&'a self, registration: &'a Registration) -> StoreFuture<'a, ()>;
}

/// Result of a profile lookup. The store may return the identity record
/// alongside the profile, even when no profile exists yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfileLookup {
    pub profile: Option<Profile>,
    pub user: Option<Value>,
}

pub trait ProfileStore: Send + Sync {
    /// Fetch the profile owned by the bearer; `profile` is `None` when there
    /// is none.
    fn fetch_profile<'a>(&'a self, bearer: &'a str) -> StoreFuture<'a, ProfileLookup>;

    fn create_profile<'a>(
        &'a self,
        bearer: &'a str,
        profile: &'a NewProfile,
    ) -> StoreFuture<'a, Profile>;
}

#[derive(Clone)]
pub struct CredentialExchange {
    identity: Arc<dyn IdentityStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl std::fmt::Debug for CredentialExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialExchange").finish_non_exhaustive()
    }
}

impl CredentialExchange {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { identity, profiles }
    }

    /// Exchange an identifier/secret pair for session claims.
    ///
    /// # Errors
    /// `InvalidCredentials` for empty input or a rejection by the identity
    /// store, `Transport` when the store cannot be reached.
    #[instrument(skip(self, secret))]
    pub async fn exchange(
        &self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<SessionClaims, AuthError> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.expose_secret().is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let login = match self.identity.login(identifier, secret).await {
            Ok(login) => login,
            Err(StoreError::Transport(err)) => {
                error!("identity store unreachable: {err}");
                return Err(AuthError::Transport(err));
            }
            Err(err) => {
                debug!("login rejected: {err}");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let display_name = derive_display_name(&login.user, identifier);
        let (profile, profile_user) = self.load_or_provision_profile(&login, &display_name).await;
        // The profile lookup user wins over the login user.
        let backing_user = profile_user.unwrap_or(login.user.raw);

        Ok(SessionClaims::new(
            login.user.id,
            login.user.email,
            display_name,
            login.bearer_credential,
            profile,
            Some(backing_user),
        ))
    }

    async fn load_or_provision_profile(
        &self,
        login: &LoginSuccess,
        display_name: &str,
    ) -> (Option<Profile>, Option<Value>) {
        match self.profiles.fetch_profile(&login.bearer_credential).await {
            Ok(ProfileLookup {
                profile: Some(profile),
                user,
            }) => (Some(profile), user),
            Ok(ProfileLookup {
                profile: None,
                user,
            }) => (self.provision_profile(login, display_name).await, user),
            Err(StoreError::NotFound) => (self.provision_profile(login, display_name).await, None),
            Err(err) => {
                warn!(user_id = %login.user.id, "profile lookup failed: {err}");
                (None, None)
            }
        }
    }

    async fn provision_profile(&self, login: &LoginSuccess, display_name: &str) -> Option<Profile> {
        let new_profile = NewProfile {
            role: Role::NormalUser,
            display_name: display_name.to_string(),
            owner_id: login.user.id.clone(),
        };
        match self
            .profiles
            .create_profile(&login.bearer_credential, &new_profile)
            .await
        {
            Ok(profile) => Some(profile),
            Err(err) => {
                let err = AuthError::ProfileProvisioningFailed(err.to_string());
                warn!(user_id = %login.user.id, "{err}; continuing without profile");
                None
            }
        }
    }

    /// Forward a registration to the identity store. No session is issued.
    ///
    /// # Errors
    /// `Rejected` for missing fields or a store rejection, `Transport` when the
    /// store cannot be reached.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: &Registration) -> Result<(), StoreError> {
        if registration.username.trim().is_empty()
            || registration.email.trim().is_empty()
            || registration.password.expose_secret().is_empty()
        {
            return Err(StoreError::Rejected(
                "Username, email and password are required".to_string(),
            ));
        }
        self.identity.register(registration).await
    }
}

/// Username first, then the local part of the email, then the identifier.
fn derive_display_name(user: &IdentityUser, identifier: &str) -> String {
    if !user.username.trim().is_empty() {
        return user.username.trim().to_string();
    }
    let email = if user.email.is_empty() {
        identifier
    } else {
        user.email.as_str()
    };
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .unwrap_or(identifier)
        .to_string()
}
