//! Command-line argument dispatch.
//!
//! Turns validated matches into an [`Action`], rejecting inconsistent
//! configuration before anything is started.

use crate::api::Environment;
use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_ENV, ARG_PORT, auth, database, limiter};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(4000);
    let environment = matches
        .get_one::<String>(ARG_ENV)
        .map(|env| env.parse::<Environment>())
        .transpose()?
        .unwrap_or_default();

    Ok(Action::Server(Args {
        port,
        environment,
        database: database::Options::parse(matches)?,
        auth: auth::Options::parse(matches)?,
        limiter: limiter::Options::parse(matches)?,
    }))
}
