//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let frontend_base_url = matches
        .get_one::<String>(auth::ARG_FRONTEND_BASE_URL)
        .cloned()
        .context("missing required argument: --frontend-base-url")?;
    let token_secret = matches
        .get_one::<String>(auth::ARG_TOKEN_SECRET)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --token-secret")?;
    let code_ttl_seconds = matches
        .get_one::<i64>(auth::ARG_CODE_TTL_SECONDS)
        .copied()
        .unwrap_or(600);
    let session_ttl_seconds = matches
        .get_one::<i64>(auth::ARG_SESSION_TTL_SECONDS)
        .copied()
        .unwrap_or(2_592_000);
    let sweep_interval_seconds = matches
        .get_one::<u64>(auth::ARG_SWEEP_INTERVAL_SECONDS)
        .copied()
        .unwrap_or(3600);
    let strict_code_delivery = matches.get_flag(auth::ARG_STRICT_CODE_DELIVERY);

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url,
        token_secret,
        code_ttl_seconds,
        session_ttl_seconds,
        sweep_interval_seconds,
        strict_code_delivery,
    }))
}
