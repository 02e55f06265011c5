use clap::{Arg, ArgAction, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SWEEP_INTERVAL_SECONDS: &str = "sweep-interval-seconds";
pub const ARG_STRICT_CODE_DELIVERY: &str = "strict-code-delivery";

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Dashboard base URL, used for CORS and cookie security")
                .env("FUNDSYNC_FRONTEND_BASE_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HMAC key for session token signatures (min 32 bytes)")
                .env("FUNDSYNC_TOKEN_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("One-time sign-in code TTL in seconds")
                .env("FUNDSYNC_CODE_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session TTL in seconds")
                .env("FUNDSYNC_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL_SECONDS)
                .long(ARG_SWEEP_INTERVAL_SECONDS)
                .help("Interval between sweeps of expired codes and sessions")
                .env("FUNDSYNC_SWEEP_INTERVAL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_STRICT_CODE_DELIVERY)
                .long(ARG_STRICT_CODE_DELIVERY)
                .help("Fail code requests when email delivery fails instead of reporting issued")
                .env("FUNDSYNC_STRICT_CODE_DELIVERY")
                .action(ArgAction::SetTrue),
        )
}
