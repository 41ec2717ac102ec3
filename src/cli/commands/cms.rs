use crate::cms::DEFAULT_CMS_URL;
use clap::{Arg, ArgMatches, Command};

pub const ARG_CMS_URL: &str = "cms-url";

#[derive(Debug)]
pub struct Options {
    pub url: String,
}

impl Options {
    /// Parse CMS arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the CMS URL is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = matches
            .get_one::<String>(ARG_CMS_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_CMS_URL}"))?;
        Ok(Self { url })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_CMS_URL)
            .long(ARG_CMS_URL)
            .help("CMS base URL (identity store, profiles and course catalog)")
            .long_help(
                "CMS base URL. A trailing `/api` is accepted and stripped, so both http://cms:1337 and http://cms:1337/api work.",
            )
            .env("COURSEGATE_CMS_URL")
            .default_value(DEFAULT_CMS_URL),
    )
}
