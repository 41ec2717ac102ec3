//! HTTP client for the external CMS (identity store, profile store, catalog).
//!
//! The CMS speaks the Strapi REST dialect: `/api/auth/local` for sign-in,
//! `/api/user-profiles` for profiles and `/api/courses` for the catalog. Error
//! bodies look like `{"data": null, "error": {"status": 400, "message": ".."}}`.

pub mod courses;

use crate::{
    auth::{
        claims::Profile,
        exchange::{
            IdentityStore, IdentityUser, LoginSuccess, NewProfile, ProfileLookup, ProfileStore,
            Registration, StoreError, StoreFuture,
        },
    },
    APP_USER_AGENT,
};
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info_span, instrument, Instrument};
use url::Url;

pub const DEFAULT_CMS_URL: &str = "http://localhost:1337";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Strip a trailing `/` and a trailing `/api` so paths can always start with
/// `/api/...` without doubling the prefix.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed.strip_suffix("/api").unwrap_or(trimmed).to_string()
}

#[derive(Clone, Debug)]
pub struct CmsClient {
    client: Client,
    base_url: String,
}

impl CmsClient {
    /// # Errors
    /// Returns an error if the base URL is not an absolute URL or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = normalize_base_url(base_url);
        Url::parse(&base_url).with_context(|| format!("Invalid CMS base URL: {base_url}"))?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build CMS HTTP client")?;

        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }

    fn get(&self, path_and_query: &str, bearer: Option<&str>) -> RequestBuilder {
        with_bearer(self.client.get(self.endpoint(path_and_query)), bearer)
    }

    fn post(&self, path: &str, bearer: Option<&str>, body: &Value) -> RequestBuilder {
        with_bearer(self.client.post(self.endpoint(path)), bearer).json(body)
    }

    /// GET a JSON document, mapping non-success statuses to [`StoreError`].
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
        bearer: Option<&str>,
    ) -> Result<T, StoreError> {
        let span = info_span!("cms.request", http.method = "GET", path = path_and_query);
        let response = self
            .get(path_and_query, bearer)
            .send()
            .instrument(span)
            .await
            .map_err(transport_error)?;
        decode(ensure_success(response).await?).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<T, StoreError> {
        let span = info_span!("cms.request", http.method = "POST", path);
        let response = self
            .post(path, bearer, body)
            .send()
            .instrument(span)
            .await
            .map_err(transport_error)?;
        decode(ensure_success(response).await?).await
    }

    #[instrument(skip(self, secret))]
    async fn login_inner(
        &self,
        identifier: &str,
        secret: &secrecy::SecretString,
    ) -> Result<LoginSuccess, StoreError> {
        let body = json!({
            "identifier": identifier,
            "password": secret.expose_secret(),
        });
        let payload: Value = self.post_json("/api/auth/local", None, &body).await?;

        let jwt = payload
            .get("jwt")
            .and_then(Value::as_str)
            .filter(|jwt| !jwt.is_empty())
            .ok_or_else(|| unexpected(StatusCode::OK, "login response without jwt"))?;
        let user = payload
            .get("user")
            .filter(|user| user.is_object())
            .ok_or_else(|| unexpected(StatusCode::OK, "login response without user"))?;

        Ok(LoginSuccess {
            bearer_credential: jwt.to_string(),
            user: identity_user(user)?,
        })
    }

    #[instrument(skip(self, registration), fields(username = %registration.username))]
    async fn register_inner(&self, registration: &Registration) -> Result<(), StoreError> {
        let body = json!({
            "username": registration.username,
            "email": registration.email,
            "password": registration.password.expose_secret(),
        });
        let _: Value = self
            .post_json("/api/auth/local/register", None, &body)
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn fetch_profile_inner(&self, bearer: &str) -> Result<ProfileLookup, StoreError> {
        let payload: Value = match self.get_json("/api/user-profiles/me", Some(bearer)).await {
            Ok(payload) => payload,
            Err(StoreError::NotFound) => return Ok(ProfileLookup::default()),
            Err(err) => return Err(err),
        };
        let user = payload.get("user").filter(|user| user.is_object()).cloned();
        let profile = match payload.get("profile") {
            None | Some(Value::Null) => None,
            Some(profile) => Some(
                serde_json::from_value::<Profile>(flatten_entity(profile.clone())).map_err(|err| {
                    unexpected(StatusCode::OK, &format!("invalid profile: {err}"))
                })?,
            ),
        };
        Ok(ProfileLookup { profile, user })
    }

    #[instrument(skip(self, bearer))]
    async fn create_profile_inner(
        &self,
        bearer: &str,
        profile: &NewProfile,
    ) -> Result<Profile, StoreError> {
        let body = json!({
            "data": {
                "role": profile.role,
                "displayName": profile.display_name,
                "owner": profile.owner_id,
            }
        });
        let payload: Value = self
            .post_json("/api/user-profiles", Some(bearer), &body)
            .await?;
        let data = payload.get("data").cloned().unwrap_or(payload);
        serde_json::from_value(flatten_entity(data))
            .map_err(|err| unexpected(StatusCode::OK, &format!("invalid profile: {err}")))
    }
}

impl IdentityStore for CmsClient {
    fn login<'a>(
        &'a self,
        identifier: &'a str,
        secret: &'a secrecy::SecretString,
    ) -> StoreFuture<'a, LoginSuccess> {
        Box::pin(self.login_inner(identifier, secret))
    }

    fn register<'a>(&'a self, registration: &'a Registration) -> StoreFuture<'a, ()> {
        Box::pin(self.register_inner(registration))
    }
}

impl ProfileStore for CmsClient {
    fn fetch_profile<'a>(&'a self, bearer: &'a str) -> StoreFuture<'a, ProfileLookup> {
        Box::pin(self.fetch_profile_inner(bearer))
    }

    fn create_profile<'a>(
        &'a self,
        bearer: &'a str,
        profile: &'a NewProfile,
    ) -> StoreFuture<'a, Profile> {
        Box::pin(self.create_profile_inner(bearer, profile))
    }
}

fn with_bearer(builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    debug!("CMS request failed: {err}");
    StoreError::Transport(err.to_string())
}

fn unexpected(status: StatusCode, message: &str) -> StoreError {
    StoreError::Unexpected {
        status: status.as_u16(),
        message: message.to_string(),
    }
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = error_message(&body).unwrap_or_else(|| status.to_string());
    debug!(status = status.as_u16(), "CMS rejected request: {message}");

    Err(match status {
        StatusCode::NOT_FOUND => StoreError::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoreError::Rejected(message)
        }
        _ => unexpected(status, &message),
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let status = response.status();
    response
        .json()
        .await
        .map_err(|err| unexpected(status, &format!("invalid JSON body: {err}")))
}

/// Message from a Strapi error body, `{"error": {"message": ".."}}`.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

/// Turn a `{id, attributes: {..}}` entity into a flat object. Values that are
/// already flat are returned untouched.
pub(crate) fn flatten_entity(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("attributes") {
            Some(Value::Object(mut attributes)) => {
                if let Some(id) = map.remove("id") {
                    attributes.insert("id".to_string(), id);
                }
                Value::Object(attributes)
            }
            Some(other) => {
                map.insert("attributes".to_string(), other);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

fn identity_user(user: &Value) -> Result<IdentityUser, StoreError> {
    let id = match user.get("id") {
        Some(Value::Number(id)) => id.to_string(),
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        _ => return Err(unexpected(StatusCode::OK, "login user without id")),
    };
    let text = |key: &str| {
        user.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Ok(IdentityUser {
        id,
        username: text("username"),
        email: text("email"),
        raw: user.clone(),
    })
}
