//! Route access-control gate.
//!
//! Flow Overview: find the longest protected prefix for the request path; no
//! match passes through. A match without a usable session redirects to the
//! login page with the original location as `callbackUrl`. A session whose
//! role is not allowed is redirected to its role home, or to the generic
//! dashboard when the home would bounce it straight back.

use super::{
    policy::ProtectedRoutePolicy,
    role::{Role, GENERIC_HOME},
    session::resolve_request,
    AuthState, LOGIN_PATH,
};
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
    PassThrough,
    RedirectToLogin { location: String },
    Denied { location: String },
}

impl GateDecision {
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::PassThrough => None,
            Self::RedirectToLogin { location } | Self::Denied { location } => Some(location),
        }
    }
}

/// Decide what happens to a request for `path` made with the given session
/// role (`None` when there is no usable session).
#[must_use]
pub fn evaluate(
    policy: &ProtectedRoutePolicy,
    path: &str,
    query: Option<&str>,
    role: Option<Role>,
) -> GateDecision {
    let Some((_, allowed)) = policy.match_prefix(path) else {
        return GateDecision::PassThrough;
    };

    let Some(role) = role else {
        return GateDecision::RedirectToLogin {
            location: login_location(path, query),
        };
    };

    if allowed.contains(&role) {
        return GateDecision::PassThrough;
    }

    GateDecision::Denied {
        location: format!("{}?error=unauthorized", denial_target(policy, path, role)),
    }
}

/// `/login?callbackUrl=<path[?query]>` with the callback percent-encoded.
#[must_use]
pub fn login_location(path: &str, query: Option<&str>) -> String {
    let original = match query.filter(|query| !query.is_empty()) {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let callback: String = form_urlencoded::byte_serialize(original.as_bytes()).collect();
    format!("{LOGIN_PATH}?callbackUrl={callback}")
}

fn denial_target(policy: &ProtectedRoutePolicy, path: &str, role: Role) -> &'static str {
    let home = role.home();
    if path.starts_with(home) || !policy.allows(home, role) {
        GENERIC_HOME
    } else {
        home
    }
}

/// axum middleware applying [`evaluate`] to every request. Allowed requests
/// carry the resolved [`SessionClaims`](super::claims::SessionClaims) in their
/// extensions.
pub async fn route_gate(
    Extension(state): Extension<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = resolve_request(request.headers(), state.issuer());
    let path = request.uri().path().to_string();
    let decision = evaluate(
        state.policy(),
        &path,
        request.uri().query(),
        claims.as_ref().map(|claims| claims.role()),
    );

    match decision {
        GateDecision::PassThrough => {
            if let Some(claims) = claims {
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
        GateDecision::RedirectToLogin { location } => {
            debug!(%path, "no session for protected path");
            Redirect::temporary(&location).into_response()
        }
        GateDecision::Denied { location } => {
            debug!(%path, %location, "role not allowed for protected path");
            Redirect::temporary(&location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ProtectedRoutePolicy {
        ProtectedRoutePolicy::default()
    }

    const PATHS: [&str; 12] = [
        "/",
        "/about",
        "/dashboard",
        "/dashboard/settings",
        "/student",
        "/student/42",
        "/manager",
        "/manager/posts",
        "/dev",
        "/dev/page",
        "/developer",
        "/login",
    ];

    #[test]
    fn unprotected_paths_pass_without_session() {
        for path in ["/", "/about", "/login", "/api/courses"] {
            assert_eq!(evaluate(&policy(), path, None, None), GateDecision::PassThrough);
        }
    }

    #[test]
    fn allowed_pairs_pass_through() {
        let policy = policy();
        for role in Role::ALL {
            for path in PATHS {
                if policy.allows(path, role) {
                    assert_eq!(
                        evaluate(&policy, path, None, Some(role)),
                        GateDecision::PassThrough,
                        "{role} on {path}"
                    );
                }
            }
        }
    }

    #[test]
    fn missing_session_redirects_to_login_with_callback() {
        assert_eq!(
            evaluate(&policy(), "/student/42", None, None),
            GateDecision::RedirectToLogin {
                location: "/login?callbackUrl=%2Fstudent%2F42".to_string()
            }
        );
        assert_eq!(
            evaluate(&policy(), "/dev/page", Some("tab=logs&x=1"), None).location(),
            Some("/login?callbackUrl=%2Fdev%2Fpage%3Ftab%3Dlogs%26x%3D1")
        );
    }

    #[test]
    fn developer_reaches_dev_pages() {
        assert_eq!(
            evaluate(&policy(), "/dev/page", None, Some(Role::Developer)),
            GateDecision::PassThrough
        );
    }

    #[test]
    fn denied_role_goes_to_its_home() {
        assert_eq!(
            evaluate(&policy(), "/dev", None, Some(Role::Student)),
            GateDecision::Denied {
                location: "/student?error=unauthorized".to_string()
            }
        );
        assert_eq!(
            evaluate(&policy(), "/student/42", None, Some(Role::SocialMediaManager)).location(),
            Some("/manager?error=unauthorized")
        );
        assert_eq!(
            evaluate(&policy(), "/manager", None, Some(Role::NormalUser)).location(),
            Some("/dashboard?error=unauthorized")
        );
    }

    #[test]
    fn denied_under_own_home_falls_back_to_dashboard() -> anyhow::Result<()> {
        // A stricter sub-prefix inside the student home.
        let policy = ProtectedRoutePolicy::from_json(
            r#"{
                "/dashboard": ["NormalUser", "Student", "SocialMediaManager", "Developer"],
                "/student": ["Student", "Developer"],
                "/student/grading": ["Developer"]
            }"#,
        )?;
        assert_eq!(
            evaluate(&policy, "/student/grading", None, Some(Role::Student)).location(),
            Some("/dashboard?error=unauthorized")
        );
        Ok(())
    }

    #[test]
    fn home_that_denies_the_role_falls_back_to_dashboard() -> anyhow::Result<()> {
        let policy = ProtectedRoutePolicy::from_json(
            r#"{"/manager": ["Developer"], "/reports": ["Developer"]}"#,
        )?;
        assert_eq!(
            evaluate(&policy, "/reports", None, Some(Role::SocialMediaManager)).location(),
            Some("/dashboard?error=unauthorized")
        );
        Ok(())
    }

    #[test]
    fn redirect_chains_terminate() {
        let policy = policy();
        for role in Role::ALL {
            for start in PATHS {
                let mut path = start.to_string();
                let mut hops = 0;
                loop {
                    match evaluate(&policy, &path, None, Some(role)) {
                        GateDecision::PassThrough => break,
                        GateDecision::Denied { location } => {
                            let target = location
                                .split('?')
                                .next()
                                .unwrap_or_default()
                                .to_string();
                            assert!(
                                policy.allows(&target, role),
                                "{role} redirected from {path} to {target}, which denies it"
                            );
                            path = target;
                        }
                        GateDecision::RedirectToLogin { .. } => {
                            panic!("authenticated {role} sent to login from {path}")
                        }
                    }
                    hops += 1;
                    assert!(hops <= 1, "{role} bounced more than once from {start}");
                }
            }
        }
    }
}
