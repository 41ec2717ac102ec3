use super::handlers::{auth, courses, health};
use utoipa::{
    openapi::{Contact, InfoBuilder, License},
    OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login,
        auth::logout,
        auth::session,
        auth::register,
        courses::list,
        courses::content,
    ),
    components(schemas(
        auth::LoginRequest,
        auth::LoginResponse,
        auth::SessionResponse,
        auth::RegisterRequest,
        auth::RegisterResponse,
        courses::CourseList,
        courses::CourseEnvelope,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Sign-in, sign-out and registration against the CMS"),
        (name = "courses", description = "Course catalog and role-gated course content"),
    )
)]
struct ApiDoc;

/// `OpenAPI` document for every JSON endpoint. HTML pages are not documented.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info = cargo_info();
    doc
}

fn cargo_info() -> utoipa::openapi::Info {
    // Use Cargo.toml metadata instead of the derive defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });
    info
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = match primary.find('<') {
        Some(start) => (
            primary[..start].trim(),
            primary[start + 1..].trim_end_matches('>').trim(),
        ),
        None => (primary, ""),
    };
    if name.is_empty() && email.is_empty() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = optional_str(name).map(str::to_string);
    contact.email = optional_str(email).map(str::to_string);
    Some(contact)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
