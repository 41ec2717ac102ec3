//! Roles and their landing paths.

use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// Coarse permission tier attached to a user profile.
///
/// Exactly one role is active per session. Unknown or missing values fall back
/// to [`Role::NormalUser`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, ToSchema)]
pub enum Role {
    #[default]
    NormalUser,
    Student,
    SocialMediaManager,
    Developer,
}

/// Generic authenticated landing page, reachable by every role.
pub const GENERIC_HOME: &str = "/dashboard";

impl Role {
    pub const ALL: [Role; 4] = [
        Role::NormalUser,
        Role::Student,
        Role::SocialMediaManager,
        Role::Developer,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::NormalUser => "NormalUser",
            Role::Student => "Student",
            Role::SocialMediaManager => "SocialMediaManager",
            Role::Developer => "Developer",
        }
    }

    /// Landing path for users of this role.
    #[must_use]
    pub const fn home(self) -> &'static str {
        match self {
            Role::NormalUser => GENERIC_HOME,
            Role::Student => "/student",
            Role::SocialMediaManager => "/manager",
            Role::Developer => "/dev",
        }
    }

    /// Parse a role name, defaulting to `NormalUser` when absent or unknown.
    #[must_use]
    pub fn from_optional(value: Option<&str>) -> Self {
        value
            .and_then(|name| name.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "NormalUser" => Ok(Role::NormalUser),
            "Student" => Ok(Role::Student),
            "SocialMediaManager" => Ok(Role::SocialMediaManager),
            "Developer" => Ok(Role::Developer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// Tokens and CMS payloads may carry roles we do not know about; those decode
// as the default instead of failing the whole document.
impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Role::from_optional(value.as_deref()))
    }
}

/// Render a role list as `A, B, C`.
#[must_use]
pub fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn unknown_or_missing_defaults_to_normal_user() {
        assert_eq!(Role::from_optional(None), Role::NormalUser);
        assert_eq!(Role::from_optional(Some("Admin")), Role::NormalUser);
        assert_eq!(Role::from_optional(Some("")), Role::NormalUser);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn deserializes_leniently() -> anyhow::Result<()> {
        let role: Role = serde_json::from_str("\"Developer\"")?;
        assert_eq!(role, Role::Developer);
        let role: Role = serde_json::from_str("\"Wizard\"")?;
        assert_eq!(role, Role::NormalUser);
        let role: Role = serde_json::from_str("null")?;
        assert_eq!(role, Role::NormalUser);
        Ok(())
    }

    #[test]
    fn homes_match_landing_pages() {
        assert_eq!(Role::NormalUser.home(), "/dashboard");
        assert_eq!(Role::Student.home(), "/student");
        assert_eq!(Role::SocialMediaManager.home(), "/manager");
        assert_eq!(Role::Developer.home(), "/dev");
    }

    #[test]
    fn join_roles_uses_comma_space() {
        assert_eq!(
            join_roles(&[Role::Student, Role::Developer]),
            "Student, Developer"
        );
    }
}
