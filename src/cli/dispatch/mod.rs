//! Command-line argument dispatch.
//!
//! Parses validated CLI arguments and maps them to the action to run, such as
//! starting the HTTP server with its full configuration.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, cms};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let cms_opts = cms::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        cms_url: cms_opts.url,
        session_secret: auth_opts.session_secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        frontend_base_url: auth_opts.frontend_base_url,
        policy_path: auth_opts.policy_path,
    }))
}
