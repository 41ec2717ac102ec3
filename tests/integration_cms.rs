//! CMS client tests against a local stand-in for the Strapi REST API.
//!
//! The stand-in binds `127.0.0.1:0`, so the suite needs no external services.
//! It answers the endpoints the gate calls: local auth, user profiles and the
//! course collection.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use coursegate::{
    auth::{
        exchange::{
            CredentialExchange, IdentityStore, ProfileLookup, ProfileStore, Registration,
            StoreError,
        },
        role::Role,
    },
    cms::{courses::CourseCatalog, CmsClient},
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::net::TcpListener;

const PASSWORD: &str = "correct horse";

#[derive(Default)]
struct Calls {
    profiles_created: AtomicUsize,
}

fn strapi_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "data": null,
            "error": {"status": status.as_u16(), "name": "ApplicationError", "message": message}
        })),
    )
        .into_response()
}

async fn local_login(Json(body): Json<Value>) -> Response {
    let identifier = body["identifier"].as_str().unwrap_or_default();
    if body["password"] != PASSWORD {
        return strapi_error(StatusCode::BAD_REQUEST, "Invalid identifier or password");
    }
    let username = identifier.split('@').next().unwrap_or_default();
    Json(json!({
        "jwt": format!("jwt-{username}"),
        "user": {"id": 12, "username": username, "email": identifier, "confirmed": true}
    }))
    .into_response()
}

async fn local_register(Json(body): Json<Value>) -> Response {
    if body["username"] == "taken" {
        return strapi_error(StatusCode::BAD_REQUEST, "Email or Username are already taken");
    }
    Json(json!({"jwt": "jwt-new", "user": {"id": 13, "username": body["username"]}})).into_response()
}

async fn my_profile(headers: HeaderMap) -> Response {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    match bearer {
        "Bearer jwt-student" => Json(json!({
            "profile": {"id": 3, "attributes": {"role": "Student", "displayName": "Stu Dent"}},
            "user": {"id": 12, "username": "student"}
        }))
        .into_response(),
        "Bearer jwt-broken" => strapi_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        _ => strapi_error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn create_profile(State(calls): State<Arc<Calls>>, Json(body): Json<Value>) -> Response {
    calls.profiles_created.fetch_add(1, Ordering::SeqCst);
    let data = &body["data"];
    if data["displayName"] == "nocreate" {
        return strapi_error(StatusCode::FORBIDDEN, "Forbidden");
    }
    Json(json!({
        "data": {
            "id": 21,
            "attributes": {"role": data["role"], "displayName": data["displayName"]}
        }
    }))
    .into_response()
}

fn strapi_course(id: u64, slug: &str) -> Value {
    json!({
        "id": id,
        "attributes": {
            "title": format!("Course {slug}"),
            "slug": slug,
            "description": "From the CMS",
            "isPublic": true,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z",
            "thumbnail": {"data": null},
            "modules": {"data": [{
                "id": id * 10,
                "attributes": {
                    "title": "Intro",
                    "orderIndex": 1,
                    "classes": {"data": [{
                        "id": id * 100,
                        "attributes": {
                            "title": "Welcome",
                            "slug": "welcome",
                            "orderIndex": 1,
                            "topics": {"data": []}
                        }
                    }]}
                }
            }]}
        }
    })
}

async fn courses(Query(query): Query<HashMap<String, String>>) -> Response {
    let all = [strapi_course(1, "rust-101"), strapi_course(2, "async-201")];
    let data: Vec<Value> = match query.get("filters[slug][$eq]") {
        Some(slug) => all
            .into_iter()
            .filter(|course| course["attributes"]["slug"] == slug.as_str())
            .collect(),
        None => all.into_iter().collect(),
    };
    let total = data.len();
    Json(json!({"data": data, "meta": {"pagination": {"total": total}}})).into_response()
}

async fn spawn_fake_cms() -> Result<(String, Arc<Calls>)> {
    let calls = Arc::new(Calls::default());
    let app = Router::new()
        .route("/api/auth/local", post(local_login))
        .route("/api/auth/local/register", post(local_register))
        .route("/api/user-profiles/me", get(my_profile))
        .route("/api/user-profiles", post(create_profile))
        .route("/api/courses", get(courses))
        .with_state(calls.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind fake CMS")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api/"), calls))
}

#[tokio::test]
async fn login_returns_bearer_and_user() -> Result<()> {
    let (base_url, _) = spawn_fake_cms().await?;
    let cms = CmsClient::new(&base_url)?;
    assert!(!cms.base_url().ends_with("/api/"));

    let success = cms
        .login("student@example.com", &SecretString::from(PASSWORD.to_string()))
        .await?;
    assert_eq!(success.bearer_credential, "jwt-student");
    assert_eq!(success.user.id, "12");
    assert_eq!(success.user.email, "student@example.com");

    let rejected = cms
        .login("student@example.com", &SecretString::from("nope".to_string()))
        .await;
    assert!(
        matches!(rejected, Err(StoreError::Rejected(ref message)) if message == "Invalid identifier or password")
    );
    Ok(())
}

#[tokio::test]
async fn profiles_are_fetched_and_created() -> Result<()> {
    let (base_url, calls) = spawn_fake_cms().await?;
    let cms = CmsClient::new(&base_url)?;

    let lookup = cms.fetch_profile("jwt-student").await?;
    assert_eq!(lookup.user, Some(json!({"id": 12, "username": "student"})));
    let profile = lookup.profile;
    assert_eq!(profile.as_ref().map(|profile| profile.role), Some(Role::Student));
    assert_eq!(
        profile.and_then(|profile| profile.display_name),
        Some("Stu Dent".to_string())
    );

    assert_eq!(cms.fetch_profile("jwt-nobody").await?, ProfileLookup::default());
    assert!(matches!(
        cms.fetch_profile("jwt-broken").await,
        Err(StoreError::Unexpected { status: 500, .. })
    ));
    assert_eq!(calls.profiles_created.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn exchange_provisions_missing_profile_over_http() -> Result<()> {
    let (base_url, calls) = spawn_fake_cms().await?;
    let cms = Arc::new(CmsClient::new(&base_url)?);
    let exchange = CredentialExchange::new(cms.clone(), cms);

    let claims = exchange
        .exchange("newbie@example.com", &SecretString::from(PASSWORD.to_string()))
        .await?;
    assert_eq!(claims.role(), Role::NormalUser);
    assert_eq!(claims.profile().map(|profile| profile.id), Some(Some(21)));
    assert_eq!(claims.preferred_name(), "newbie");
    assert_eq!(calls.profiles_created.load(Ordering::SeqCst), 1);

    let claims = exchange
        .exchange("student@example.com", &SecretString::from(PASSWORD.to_string()))
        .await?;
    assert_eq!(claims.role(), Role::Student);
    assert_eq!(
        claims.backing_user(),
        Some(&json!({"id": 12, "username": "student"}))
    );
    assert_eq!(calls.profiles_created.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn failed_provisioning_still_signs_in() -> Result<()> {
    let (base_url, calls) = spawn_fake_cms().await?;
    let cms = Arc::new(CmsClient::new(&base_url)?);
    let exchange = CredentialExchange::new(cms.clone(), cms);

    let claims = exchange
        .exchange("nocreate@example.com", &SecretString::from(PASSWORD.to_string()))
        .await?;
    assert_eq!(claims.role(), Role::NormalUser);
    assert!(claims.profile().is_none());
    assert_eq!(calls.profiles_created.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn registration_errors_carry_cms_message() -> Result<()> {
    let (base_url, _) = spawn_fake_cms().await?;
    let cms = CmsClient::new(&base_url)?;

    let ok = Registration {
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        password: SecretString::from(PASSWORD.to_string()),
    };
    cms.register(&ok).await?;

    let taken = Registration {
        username: "taken".to_string(),
        ..ok
    };
    assert!(matches!(
        cms.register(&taken).await,
        Err(StoreError::Rejected(ref message)) if message == "Email or Username are already taken"
    ));
    Ok(())
}

#[tokio::test]
async fn catalog_is_flattened() -> Result<()> {
    let (base_url, _) = spawn_fake_cms().await?;
    let cms = CmsClient::new(&base_url)?;

    let all = cms.courses().await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].modules[0].classes[0].slug, "welcome");
    assert!(all[0].modules[0].classes[0].topics.is_empty());
    assert!(all[0].thumbnail.is_none());

    let one = cms.course_by_slug("async-201").await?;
    assert_eq!(one.map(|course| course.id), Some(2));
    assert_eq!(cms.course_by_slug("missing").await?, None);
    Ok(())
}

#[tokio::test]
async fn unreachable_cms_is_a_transport_error() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let cms = CmsClient::new(&format!("http://{addr}"))?;
    assert!(matches!(
        cms.courses().await,
        Err(StoreError::Transport(_))
    ));
    Ok(())
}
