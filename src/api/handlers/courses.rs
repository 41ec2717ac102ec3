//! Course catalog endpoints.
//!
//! The public catalog is open to everyone. Per-course content for enrolled
//! roles re-checks the session role on every call instead of trusting the
//! page-level gate.

use crate::{
    auth::{
        access::{require_role, Session},
        exchange::StoreError,
        role::Role,
    },
    cms::courses::{Course, CourseCatalog},
};
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::{IntoParams, ToSchema};

/// Roles allowed to read full course content.
pub const COURSE_CONTENT_ROLES: &[Role] = &[Role::Student, Role::Developer];

pub type Catalog = Arc<dyn CourseCatalog>;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CourseQuery {
    /// Return only the course with this slug.
    pub slug: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseList {
    pub data: Vec<Course>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CourseEnvelope {
    pub data: Course,
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Course not found" })),
    )
        .into_response()
}

fn fetch_failed(err: &StoreError) -> Response {
    error!("Failed to fetch courses: {err}");
    let status = match err {
        StoreError::Unexpected { status, .. } => StatusCode::from_u16(*status)
            .ok()
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Rejected(_) => StatusCode::BAD_REQUEST,
        StoreError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": "Failed to fetch courses" }))).into_response()
}

#[utoipa::path(
    get,
    path = "/api/courses",
    params(CourseQuery),
    responses(
        (status = 200, description = "Flattened course catalog, or a single course when `slug` is set", body = CourseList),
        (status = 404, description = "No course with that slug"),
    ),
    tag = "courses"
)]
#[instrument(skip_all, fields(slug = ?query.slug))]
pub async fn list(catalog: Extension<Catalog>, Query(query): Query<CourseQuery>) -> Response {
    match query.slug.as_deref().filter(|slug| !slug.is_empty()) {
        Some(slug) => match catalog.course_by_slug(slug).await {
            Ok(Some(course)) => Json(CourseEnvelope { data: course }).into_response(),
            Ok(None) => not_found(),
            Err(err) => fetch_failed(&err),
        },
        None => match catalog.courses().await {
            Ok(courses) => Json(CourseList { data: courses }).into_response(),
            Err(err) => fetch_failed(&err),
        },
    }
}

#[utoipa::path(
    get,
    path = "/api/student/courses/{slug}",
    params(("slug" = String, Path, description = "Course slug")),
    responses(
        (status = 200, description = "Course with its full module, class and topic tree", body = Course),
        (status = 307, description = "No session, redirected to /login"),
        (status = 403, description = "Role may not read course content"),
        (status = 404, description = "No course with that slug"),
    ),
    tag = "courses"
)]
#[instrument(skip_all, fields(%slug, role = %session.role()))]
pub async fn content(
    Session(session): Session,
    catalog: Extension<Catalog>,
    Path(slug): Path<String>,
) -> Response {
    if let Err(err) = require_role(&session, COURSE_CONTENT_ROLES) {
        return err.into_response();
    }
    match catalog.course_by_slug(&slug).await {
        Ok(Some(course)) => Json(course).into_response(),
        Ok(None) => not_found(),
        Err(err) => fetch_failed(&err),
    }
}
