//! Protected route policy: path prefix to allowed roles.
//!
//! The table is built once at start-up and shared behind an `Arc`. Matching
//! uses starts-with semantics and the longest matching prefix wins.

use super::role::{Role, GENERIC_HOME};
use anyhow::{anyhow, Context, Result};
use std::{collections::BTreeMap, fs, path::Path};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProtectedRoutePolicy {
    // Sorted longest prefix first so the first hit is the most specific.
    rules: Vec<(String, Vec<Role>)>,
}

impl Default for ProtectedRoutePolicy {
    fn default() -> Self {
        Self::from_rules([
            ("/dashboard", Role::ALL.to_vec()),
            ("/student", vec![Role::Student, Role::Developer]),
            ("/manager", vec![Role::SocialMediaManager, Role::Developer]),
            ("/dev", vec![Role::Developer]),
        ])
    }
}

impl ProtectedRoutePolicy {
    fn from_rules<I, P>(rules: I) -> Self
    where
        I: IntoIterator<Item = (P, Vec<Role>)>,
        P: Into<String>,
    {
        let mut rules: Vec<(String, Vec<Role>)> = rules
            .into_iter()
            .map(|(prefix, roles)| (prefix.into(), roles))
            .collect();
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { rules }
    }

    /// Parse a policy document of the form `{"/prefix": ["Role", ...]}`.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed, a prefix does not start with
    /// `/`, a role list is empty or names an unknown role.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).context("Invalid route policy JSON")?;
        if raw.is_empty() {
            return Err(anyhow!("Route policy must declare at least one prefix"));
        }

        let mut rules = Vec::with_capacity(raw.len());
        for (prefix, names) in raw {
            if !prefix.starts_with('/') {
                return Err(anyhow!("Route prefix must start with '/': {prefix}"));
            }
            if names.is_empty() {
                return Err(anyhow!("Route prefix {prefix} has no allowed roles"));
            }
            let mut roles = Vec::with_capacity(names.len());
            for name in names {
                let role = name
                    .parse::<Role>()
                    .with_context(|| format!("Invalid role for prefix {prefix}"))?;
                if !roles.contains(&role) {
                    roles.push(role);
                }
            }
            rules.push((prefix, roles));
        }

        let policy = Self::from_rules(rules);
        // Denied users fall back to the generic home, so it must admit everyone.
        if let Some((prefix, roles)) = policy.match_prefix(GENERIC_HOME) {
            if Role::ALL.iter().any(|role| !roles.contains(role)) {
                return Err(anyhow!(
                    "Route prefix {prefix} must allow every role, it covers {GENERIC_HOME}"
                ));
            }
        }
        Ok(policy)
    }

    /// Load a policy document from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid policy.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read route policy: {}", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Failed to load route policy: {}", path.display()))
    }

    /// Longest protected prefix matching `path`, with its allowed roles.
    #[must_use]
    pub fn match_prefix(&self, path: &str) -> Option<(&str, &[Role])> {
        self.rules
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            .map(|(prefix, roles)| (prefix.as_str(), roles.as_slice()))
    }

    /// Whether `role` may access `path`. Unprotected paths allow everyone.
    #[must_use]
    pub fn allows(&self, path: &str, role: Role) -> bool {
        self.match_prefix(path)
            .map_or(true, |(_, roles)| roles.contains(&role))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(prefix, _)| prefix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_landing_pages() {
        let policy = ProtectedRoutePolicy::default();
        assert!(policy.allows("/dashboard", Role::NormalUser));
        assert!(policy.allows("/student/courses", Role::Developer));
        assert!(!policy.allows("/student", Role::SocialMediaManager));
        assert!(policy.allows("/manager/posts", Role::SocialMediaManager));
        assert!(!policy.allows("/dev", Role::Student));
        assert!(policy.allows("/about", Role::NormalUser));
    }

    #[test]
    fn unmatched_path_has_no_prefix() {
        let policy = ProtectedRoutePolicy::default();
        assert_eq!(policy.match_prefix("/"), None);
        assert_eq!(policy.match_prefix("/login"), None);
    }

    #[test]
    fn prefix_match_is_plain_starts_with() {
        // "/developer" starts with "/dev", so it is gated like "/dev".
        let policy = ProtectedRoutePolicy::default();
        assert_eq!(
            policy.match_prefix("/developer").map(|(prefix, _)| prefix),
            Some("/dev")
        );
    }

    #[test]
    fn longest_prefix_wins() -> anyhow::Result<()> {
        let policy = ProtectedRoutePolicy::from_json(
            r#"{"/student": ["Student", "Developer"], "/student/admin": ["Developer"]}"#,
        )?;
        assert_eq!(
            policy.match_prefix("/student/admin/users"),
            Some(("/student/admin", [Role::Developer].as_slice()))
        );
        assert!(policy.allows("/student/lessons", Role::Student));
        assert!(!policy.allows("/student/admin", Role::Student));
        Ok(())
    }

    #[test]
    fn rejects_invalid_documents() {
        for json in [
            r#"{"student": ["Student"]}"#,
            r#"{"/student": []}"#,
            r#"{"/student": ["Teacher"]}"#,
            r#"{"/dashboard": ["Developer"]}"#,
            r#"{"/": ["Student"]}"#,
            r"{}",
            "not json",
        ] {
            assert!(ProtectedRoutePolicy::from_json(json).is_err(), "{json}");
        }
    }

    #[test]
    fn load_reads_file() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("coursegate-policy-{}.json", ulid::Ulid::new()));
        fs::write(&path, r#"{"/reports": ["Developer"]}"#)?;
        let policy = ProtectedRoutePolicy::load(&path);
        fs::remove_file(&path)?;
        let policy = policy?;
        assert_eq!(policy.prefixes().collect::<Vec<_>>(), vec!["/reports"]);
        Ok(())
    }
}
