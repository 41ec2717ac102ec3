//! Render-time role guard.
//!
//! The guard only decides which of four outputs to render from an already
//! resolved [`SessionState`]; it never performs I/O and is not an access
//! control boundary. Protected data must still be checked server-side with
//! [`require_role`](super::access::require_role).

use super::{
    role::{join_roles, Role, GENERIC_HOME},
    session::SessionState,
    LOGIN_PATH,
};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

pub const LOADING_MESSAGE: &str = "Checking authorization...";
pub const SIGN_IN_MESSAGE: &str = "Authentication Required";

#[derive(Clone, Debug)]
pub struct RoleGuard {
    allowed: Vec<Role>,
    fallback_message: Option<String>,
    show_login: bool,
}

/// Output of [`RoleGuard::render`].
#[derive(Clone, Debug, PartialEq)]
pub enum Guarded<T> {
    Loading {
        message: &'static str,
    },
    Unauthenticated {
        message: &'static str,
        login_href: Option<&'static str>,
    },
    Denied {
        message: String,
        current_role: Role,
        allowed: Vec<Role>,
        dashboard_href: &'static str,
    },
    Authorized(T),
}

impl RoleGuard {
    #[must_use]
    pub fn new(allowed: impl Into<Vec<Role>>) -> Self {
        Self {
            allowed: allowed.into(),
            fallback_message: None,
            show_login: true,
        }
    }

    #[must_use]
    pub fn with_fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_show_login(mut self, show_login: bool) -> Self {
        self.show_login = show_login;
        self
    }

    #[must_use]
    pub fn allowed(&self) -> &[Role] {
        &self.allowed
    }

    /// Pick the output for `state`. `children` is only called when the
    /// session's role is allowed.
    pub fn render<T>(&self, state: &SessionState, children: impl FnOnce() -> T) -> Guarded<T> {
        match state {
            SessionState::Loading => Guarded::Loading {
                message: LOADING_MESSAGE,
            },
            SessionState::Unauthenticated => Guarded::Unauthenticated {
                message: SIGN_IN_MESSAGE,
                login_href: self.show_login.then_some(LOGIN_PATH),
            },
            SessionState::Authenticated(claims) if self.allowed.contains(&claims.role()) => {
                Guarded::Authorized(children())
            }
            SessionState::Authenticated(claims) => Guarded::Denied {
                message: self.fallback_message.clone().unwrap_or_else(|| {
                    format!(
                        "You need one of the following roles to access this page: {}",
                        join_roles(&self.allowed)
                    )
                }),
                current_role: claims.role(),
                allowed: self.allowed.clone(),
                dashboard_href: GENERIC_HOME,
            },
        }
    }
}

impl<T: IntoResponse> IntoResponse for Guarded<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Authorized(children) => children.into_response(),
            Self::Loading { message } => {
                Html(format!("<p class=\"loading\">{message}</p>")).into_response()
            }
            Self::Unauthenticated {
                message,
                login_href,
            } => {
                let link = login_href
                    .map(|href| format!("<a href=\"{href}\">Sign in</a>"))
                    .unwrap_or_default();
                (
                    StatusCode::UNAUTHORIZED,
                    Html(format!("<h1>{message}</h1><p>Please sign in to continue.</p>{link}")),
                )
                    .into_response()
            }
            Self::Denied {
                message,
                current_role,
                allowed,
                dashboard_href,
            } => (
                StatusCode::FORBIDDEN,
                Html(format!(
                    "<h1>Access Denied</h1><p>{}</p><p>Your current role: {current_role}</p>\
                     <p>Allowed roles: {}</p><a href=\"{dashboard_href}\">Go to Dashboard</a>",
                    escape_html(&message),
                    join_roles(&allowed)
                )),
            )
                .into_response(),
        }
    }
}

pub(crate) fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
