//! Role landing pages rendered through the role guard, plus the login page.
//!
//! The route gate redirects most unauthorized visits before these handlers
//! run. The guard still wraps every page so a policy file that leaves one of
//! these prefixes out does not expose it.

use crate::auth::{
    access::{self, MaybeSession},
    claims::SessionClaims,
    guard::{escape_html, Guarded, RoleGuard},
    role::Role,
    session::SessionState,
};
use axum::{extract::Query, response::Html};
use serde::Deserialize;

pub const UNAUTHORIZED_NOTICE: &str = "You were redirected because your role cannot open that page.";

// The login endpoint takes JSON, so the form is submitted from script.
const LOGIN_SCRIPT: &str = r#"<script>
document.querySelector("form").addEventListener("submit", async (event) => {
  event.preventDefault();
  const form = new FormData(event.target);
  const response = await fetch(event.target.action, {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(Object.fromEntries(form)),
  });
  const body = await response.json().catch(() => ({}));
  if (response.ok) {
    window.location.assign(body.redirect_to || "/dashboard");
  } else {
    const params = new URLSearchParams(window.location.search);
    params.set("error", body.error || "Sign in failed");
    window.location.search = params.toString();
  }
});
</script>"#;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default, rename = "callbackUrl")]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PageQuery {
    fn notice(&self) -> Option<&str> {
        if self.error.as_deref() == Some("unauthorized") {
            Some(UNAUTHORIZED_NOTICE)
        } else {
            self.message.as_deref()
        }
    }
}

fn layout(title: &str, notice: Option<&str>, body: &str) -> Html<String> {
    let notice = notice
        .map(|notice| format!("<p class=\"notice\">{}</p>", escape_html(notice)))
        .unwrap_or_default();
    Html(format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body>{notice}{body}</body></html>"
    ))
}

fn greeting(claims: &SessionClaims) -> String {
    format!(
        "<p class=\"who\">Signed in as {} ({})</p>",
        escape_html(claims.preferred_name()),
        claims.role()
    )
}

fn course_list(claims: &SessionClaims) -> String {
    let items: String = access::enrolled_courses(claims)
        .iter()
        .filter_map(|course| {
            let title = course.get("title").and_then(|value| value.as_str())?;
            Some(format!("<li>{}</li>", escape_html(title)))
        })
        .collect();
    if items.is_empty() {
        "<p>No enrolled courses yet.</p>".to_string()
    } else {
        format!("<ul class=\"courses\">{items}</ul>")
    }
}

fn guarded_page(
    claims: Option<SessionClaims>,
    allowed: &[Role],
    title: &str,
    query: &PageQuery,
    body: impl FnOnce(&SessionClaims) -> String,
) -> Guarded<Html<String>> {
    let state = claims.map_or(SessionState::Unauthenticated, SessionState::Authenticated);
    RoleGuard::new(allowed).render(&state, || {
        let body = state
            .claims()
            .map(|claims| format!("<h1>{title}</h1>{}{}", greeting(claims), body(claims)))
            .unwrap_or_default();
        layout(title, query.notice(), &body)
    })
}

pub async fn login_page(
    MaybeSession(claims): MaybeSession,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let callback = escape_html(query.callback_url.as_deref().unwrap_or_default());
    let signed_in = claims
        .as_ref()
        .map(|claims| {
            format!(
                "<p>Already signed in as {}.</p>",
                escape_html(claims.preferred_name())
            )
        })
        .unwrap_or_default();
    let error = match query.error.as_deref() {
        Some("unauthorized") | None => String::new(),
        Some(error) => format!("<p class=\"error\">{}</p>", escape_html(error)),
    };
    layout(
        "Sign in",
        query.message.as_deref(),
        &format!(
            "<h1>Sign in</h1>{signed_in}{error}\
             <form method=\"post\" action=\"/api/auth/login\">\
             <input type=\"email\" name=\"email\" required>\
             <input type=\"password\" name=\"password\" required>\
             <input type=\"hidden\" name=\"callbackUrl\" value=\"{callback}\">\
             <button type=\"submit\">Sign in</button></form>{LOGIN_SCRIPT}"
        ),
    )
}

pub async fn dashboard(
    MaybeSession(claims): MaybeSession,
    Query(query): Query<PageQuery>,
) -> Guarded<Html<String>> {
    guarded_page(claims, access::AUTHENTICATED, "Dashboard", &query, |claims| {
        let home = claims.role().home();
        format!("<a href=\"{home}\">Go to your area</a>")
    })
}

pub async fn student(
    MaybeSession(claims): MaybeSession,
    Query(query): Query<PageQuery>,
) -> Guarded<Html<String>> {
    guarded_page(
        claims,
        &[Role::Student, Role::Developer],
        "My Learning",
        &query,
        course_list,
    )
}

pub async fn manager(
    MaybeSession(claims): MaybeSession,
    Query(query): Query<PageQuery>,
) -> Guarded<Html<String>> {
    guarded_page(
        claims,
        &[Role::SocialMediaManager, Role::Developer],
        "Content Manager",
        &query,
        |_| "<p>Manage posts and announcements.</p>".to_string(),
    )
}

pub async fn developer(
    MaybeSession(claims): MaybeSession,
    Query(query): Query<PageQuery>,
) -> Guarded<Html<String>> {
    guarded_page(
        claims,
        access::DEVELOPER,
        "Developer Tools",
        &query,
        |claims| {
            format!(
                "<pre>subject={} role={} profile={}</pre>",
                escape_html(claims.subject_id()),
                claims.role(),
                claims.profile().is_some()
            )
        },
    )
}
