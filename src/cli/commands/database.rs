use anyhow::{Context, Result, bail};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_DSN: &str = "dsn";
pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";
pub const ARG_DB_QUERY_TIMEOUT_SECONDS: &str = "db-query-timeout-seconds";

#[derive(Clone)]
pub struct Options {
    pub dsn: String,
    pub max_connections: u32,
    pub query_timeout: Duration,
}

// The DSN may carry a password.
impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("dsn", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

impl Options {
    /// Parse database arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the DSN is missing or a limit is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let dsn = matches
            .get_one::<String>(ARG_DSN)
            .filter(|dsn| !dsn.trim().is_empty())
            .cloned()
            .context("missing required argument: --dsn")?;

        let max_connections = matches
            .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
            .copied()
            .unwrap_or(25);
        if max_connections == 0 {
            bail!("--{ARG_DB_MAX_CONNECTIONS} must be greater than 0");
        }

        let timeout_seconds = matches
            .get_one::<u64>(ARG_DB_QUERY_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(3);
        if timeout_seconds == 0 {
            bail!("--{ARG_DB_QUERY_TIMEOUT_SECONDS} must be greater than 0");
        }

        Ok(Self {
            dsn,
            max_connections,
            query_timeout: Duration::from_secs(timeout_seconds),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("PostgreSQL connection string")
                .env("WORKOUT_TRACKER_DSN")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum open connections in the pool")
                .env("WORKOUT_TRACKER_DB_MAX_CONNECTIONS")
                .default_value("25")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_DB_QUERY_TIMEOUT_SECONDS)
                .long(ARG_DB_QUERY_TIMEOUT_SECONDS)
                .help("Deadline for a single SQL statement in seconds")
                .env("WORKOUT_TRACKER_DB_QUERY_TIMEOUT_SECONDS")
                .default_value("3")
                .value_parser(clap::value_parser!(u64)),
        )
}
