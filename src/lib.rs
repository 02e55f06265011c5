//! # Fundsync
//!
//! `fundsync` is the backend for the Fundsync fund-valuation dashboard. It
//! handles passwordless email sign-in, session management, and per-user
//! dashboard configuration sync.
//!
//! ## Sign-in (one-time codes)
//!
//! Authentication is passwordless. A user requests a six-digit one-time code
//! which is delivered out-of-band to their email address; redeeming the code
//! proves ownership of the address and establishes a session. Codes are
//! single-use, expire after ten minutes, and redemption never reveals whether
//! the email or the code was wrong.
//!
//! ## Sessions
//!
//! A successful redemption returns a compact HMAC-signed token carrying the
//! user id and a random session secret. The database stores only a SHA-256
//! hash of the secret, so a session stays revocable server-side even though
//! the token itself verifies offline. Sign-out supports a `local` scope (this
//! session only) and a `global` scope (every session for the user).
//!
//! ## Config sync
//!
//! Each user owns one JSON config document. Clients can replace it wholesale,
//! apply a shallow-merge patch, or poll `/sync` with the last observed
//! `updatedAt` cursor. The [`client`] module ships a typed API client and a
//! `ChangeFeed` subscription manager that turns cursor polling into
//! callback-based change notifications.

pub mod api;
pub mod cli;
pub mod client;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
