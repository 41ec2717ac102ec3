//! # Coursegate (session and role gate for the course platform)
//!
//! `coursegate` sits in front of the course platform pages. It trades user
//! credentials for a signed session at the CMS, keeps the session role in a
//! stateless cookie, and decides per request whether a page may be shown.
//!
//! ## Roles
//!
//! Four roles exist: `NormalUser`, `Student`, `SocialMediaManager` and
//! `Developer`. The role comes from the user's CMS profile; a user without a
//! profile gets one with `NormalUser` on first sign-in.
//!
//! ## Route Gate
//!
//! Protected prefixes (`/dashboard`, `/student`, `/manager`, `/dev`) are
//! matched by path prefix. Anonymous visitors are sent to
//! `/login?callbackUrl=...`; signed-in users without the right role are sent to
//! their role home with `?error=unauthorized`, or to `/dashboard` when the home
//! itself would bounce them again.
//!
//! ## Course Catalog
//!
//! Course records are read from the CMS and flattened into plain JSON trees
//! (course, modules, classes, topics). Full course content is only served to
//! `Student` and `Developer` sessions.

pub mod api;
pub mod auth;
pub mod cli;
pub mod cms;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
