//! Session claims model.
//!
//! Claims are a snapshot taken at credential exchange time. They are never
//! joined back to the identity store after issuance, so a role change in the
//! CMS only shows up after the user signs in again.

use super::role::Role;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Profile record kept by the CMS next to the raw identity record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub display_name: Option<String>,
    // Media shapes are owned by the CMS; keep them opaque.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub avatar: Option<Value>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub enrolled_courses: Vec<Value>,
}

/// Identity facts carried by a session token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    subject_id: String,
    email: String,
    display_name: String,
    bearer_credential: String,
    role: Role,
    profile: Option<Profile>,
    backing_user: Option<Value>,
}

/// The single precedence rule for the session role: the profile wins, the
/// backing identity record is never consulted.
#[must_use]
pub fn effective_role(profile: Option<&Profile>) -> Role {
    profile.map(|profile| profile.role).unwrap_or_default()
}

impl SessionClaims {
    #[must_use]
    pub fn new(
        subject_id: String,
        email: String,
        display_name: String,
        bearer_credential: String,
        profile: Option<Profile>,
        backing_user: Option<Value>,
    ) -> Self {
        let role = effective_role(profile.as_ref());
        Self {
            subject_id,
            email,
            display_name,
            bearer_credential,
            role,
            profile,
            backing_user,
        }
    }

    #[must_use]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Credential for calls back to the identity store on behalf of the user.
    #[must_use]
    pub fn bearer_credential(&self) -> &str {
        &self.bearer_credential
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn backing_user(&self) -> Option<&Value> {
        self.backing_user.as_ref()
    }

    /// Prefer the profile display name, then the identity username.
    #[must_use]
    pub fn preferred_name(&self) -> &str {
        self.profile
            .as_ref()
            .and_then(|profile| profile.display_name.as_deref())
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.display_name)
    }
}
