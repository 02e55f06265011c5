//! Auth handlers and supporting modules.
//!
//! Sign-in is passwordless: a six-digit one-time code proves ownership of an
//! email address, and redemption establishes a session. The session
//! credential is a compact HMAC-signed token whose embedded secret must hash
//! to a stored `user_sessions` row, so revoking the row invalidates the
//! token even though its signature still verifies. That double-indirection
//! is what makes both per-session and all-sessions sign-out possible.

mod otc;
pub(crate) mod session;
pub(crate) mod signin;
mod state;
mod storage;
pub(crate) mod sweeper;
pub(crate) mod token;
pub(crate) mod types;
mod utils;

pub use state::{AuthConfig, AuthState};
pub use token::{SessionClaims, TokenCodec, TokenError};
