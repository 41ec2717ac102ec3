use crate::auth::token::{DEFAULT_SESSION_TTL_SECONDS, MAX_SESSION_TTL_SECONDS};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_POLICY_PATH: &str = "policy-path";

#[derive(Debug)]
pub struct Options {
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub policy_path: Option<String>,
}

impl Options {
    /// Parse session and access-policy arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the session secret is missing or the TTL is not
    /// between one second and one year.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let session_secret = matches
            .get_one::<String>(ARG_SESSION_SECRET)
            .filter(|v| !v.trim().is_empty())
            .map(|v| SecretString::from(v.clone()))
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SESSION_SECRET}"))?;

        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(DEFAULT_SESSION_TTL_SECONDS);
        if session_ttl_seconds <= 0 {
            anyhow::bail!("--{ARG_SESSION_TTL_SECONDS} must be greater than zero");
        }
        if session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            anyhow::bail!(
                "--{ARG_SESSION_TTL_SECONDS} must not exceed {MAX_SESSION_TTL_SECONDS} seconds"
            );
        }

        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            session_secret,
            session_ttl_seconds,
            frontend_base_url,
            policy_path: matches
                .get_one::<String>(ARG_POLICY_PATH)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long(ARG_SESSION_SECRET)
                .help("Secret used to sign session tokens")
                .env("COURSEGATE_SESSION_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie and token TTL in seconds")
                .env("COURSEGATE_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Public frontend URL, used for CORS and the cookie Secure flag")
                .env("COURSEGATE_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_POLICY_PATH)
                .long(ARG_POLICY_PATH)
                .help("JSON file mapping protected path prefixes to allowed roles")
                .long_help(
                    "JSON file mapping protected path prefixes to allowed roles, for example {\"/student\": [\"Student\", \"Developer\"]}. The built-in table is used when unset.",
                )
                .env("COURSEGATE_POLICY_PATH"),
        )
}
