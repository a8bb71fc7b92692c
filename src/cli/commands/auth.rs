use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOKEN_ISSUER: &str = "token-issuer";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_ACTIVATION_TOKEN_TTL_SECONDS: &str = "activation-token-ttl-seconds";
pub const ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS: &str = "password-reset-token-ttl-seconds";

/// Shortest accepted HMAC secret, in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

/// Longest accepted token or session lifetime: ten years.
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub token_issuer: String,
    pub session_ttl: Duration,
    pub activation_token_ttl_seconds: i64,
    pub password_reset_token_ttl_seconds: i64,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret is missing or too short, the issuer is
    /// empty or any TTL is outside `1..=MAX_TTL_SECONDS`.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let Some(secret) = matches.get_one::<String>(ARG_JWT_SECRET) else {
            bail!("missing required argument: --{ARG_JWT_SECRET}");
        };
        let jwt_secret = SecretString::from(secret.clone());
        if jwt_secret.expose_secret().len() < MIN_SECRET_BYTES {
            bail!("--{ARG_JWT_SECRET} must be at least {MIN_SECRET_BYTES} bytes long");
        }

        let token_issuer = matches
            .get_one::<String>(ARG_TOKEN_ISSUER)
            .map(|issuer| issuer.trim().to_string())
            .unwrap_or_default();
        if token_issuer.is_empty() {
            bail!("--{ARG_TOKEN_ISSUER} must not be empty");
        }

        let ttl = |id: &str, default: i64| -> Result<i64> {
            let seconds = matches.get_one::<i64>(id).copied().unwrap_or(default);
            if seconds <= 0 {
                bail!("--{id} must be greater than 0");
            }
            if seconds > MAX_TTL_SECONDS {
                bail!("--{id} must be at most {MAX_TTL_SECONDS} seconds");
            }
            Ok(seconds)
        };

        let session_ttl_seconds = ttl(ARG_SESSION_TTL_SECONDS, 86_400)?;

        Ok(Self {
            jwt_secret,
            token_issuer,
            session_ttl: Duration::from_secs(session_ttl_seconds.unsigned_abs()),
            activation_token_ttl_seconds: ttl(ARG_ACTIVATION_TOKEN_TTL_SECONDS, 259_200)?,
            password_reset_token_ttl_seconds: ttl(ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS, 2_700)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign session tokens (at least 32 bytes)")
                .env("WORKOUT_TRACKER_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_ISSUER)
                .long(ARG_TOKEN_ISSUER)
                .help("Issuer and audience of session tokens")
                .env("WORKOUT_TRACKER_TOKEN_ISSUER")
                .default_value("workout-tracker"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token lifetime in seconds")
                .env("WORKOUT_TRACKER_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ACTIVATION_TOKEN_TTL_SECONDS)
                .long(ARG_ACTIVATION_TOKEN_TTL_SECONDS)
                .help("Activation token lifetime in seconds")
                .env("WORKOUT_TRACKER_ACTIVATION_TOKEN_TTL_SECONDS")
                .default_value("259200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS)
                .long(ARG_PASSWORD_RESET_TOKEN_TTL_SECONDS)
                .help("Password-reset token lifetime in seconds")
                .env("WORKOUT_TRACKER_PASSWORD_RESET_TOKEN_TTL_SECONDS")
                .default_value("2700")
                .value_parser(clap::value_parser!(i64)),
        )
}
