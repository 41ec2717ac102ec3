use crate::{
    api,
    auth::{
        exchange::CredentialExchange, policy::ProtectedRoutePolicy, token::SessionIssuer,
        AuthConfig, AuthState,
    },
    cms::CmsClient,
};
use anyhow::Result;
use secrecy::SecretString;
use std::{path::Path, sync::Arc};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub cms_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub frontend_base_url: String,
    pub policy_path: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the CMS client or route policy cannot be built, or the
/// server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let cms = Arc::new(CmsClient::new(&args.cms_url)?);

    let policy = match &args.policy_path {
        Some(path) => ProtectedRoutePolicy::load(Path::new(path))?,
        None => ProtectedRoutePolicy::default(),
    };

    log_startup_args(&args, cms.base_url(), &policy);

    let issuer = SessionIssuer::new(&args.session_secret, args.session_ttl_seconds);
    let exchange = CredentialExchange::new(cms.clone(), cms.clone());
    let config = AuthConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds);
    let auth_state = Arc::new(AuthState::new(config, issuer, Arc::new(policy), exchange));

    let app = api::router(auth_state, cms)?;

    api::serve(args.port, app).await
}

fn log_startup_args(args: &Args, cms_url: &str, policy: &ProtectedRoutePolicy) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("cms_url", cms_url.to_string()),
        ("frontend_base_url", args.frontend_base_url.clone()),
        ("session_ttl_seconds", args.session_ttl_seconds.to_string()),
        (
            "policy",
            args.policy_path
                .clone()
                .unwrap_or_else(|| "built-in".to_string()),
        ),
        (
            "protected_prefixes",
            policy.prefixes().collect::<Vec<_>>().join(", "),
        ),
    ];
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = String::from("Startup configuration:");
    for (key, value) in &entries {
        message.push_str(&format!("\n  {key:<max_key_len$}  {value}"));
    }
    info!("{message}");
}
