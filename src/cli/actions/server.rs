use crate::api::{
    self, DatabaseConfig, Environment,
    handlers::auth::{AuthConfig, NoopRateLimiter, RateLimiter, SessionCodec, TokenBucket},
};
use crate::cli::{
    commands::{auth, database, limiter},
    telemetry,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub environment: Environment,
    pub database: database::Options,
    pub auth: auth::Options,
    pub limiter: limiter::Options,
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.port,
        environment = %args.environment,
        db_max_connections = args.database.max_connections,
        db_query_timeout_seconds = args.database.query_timeout.as_secs(),
        token_issuer = %args.auth.token_issuer,
        session_ttl_seconds = args.auth.session_ttl.as_secs(),
        limiter_enabled = args.limiter.enabled,
        limiter_rps = args.limiter.rps,
        limiter_burst = args.limiter.burst,
        "starting {} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        crate::GIT_COMMIT_HASH
    );
}

fn rate_limiter(options: limiter::Options) -> Arc<dyn RateLimiter> {
    if options.enabled {
        Arc::new(TokenBucket::new(options.rps, options.burst))
    } else {
        Arc::new(NoopRateLimiter)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let sessions = SessionCodec::new(
        &args.auth.jwt_secret,
        &args.auth.token_issuer,
        args.auth.session_ttl,
    );
    let auth_config = AuthConfig::new()
        .with_activation_token_ttl_seconds(args.auth.activation_token_ttl_seconds)
        .with_password_reset_token_ttl_seconds(args.auth.password_reset_token_ttl_seconds);

    let database = DatabaseConfig {
        dsn: args.database.dsn,
        max_connections: args.database.max_connections,
        query_timeout: args.database.query_timeout,
    };

    let result = api::new(
        args.port,
        database,
        args.environment,
        sessions,
        auth_config,
        rate_limiter(args.limiter),
    )
    .await;

    telemetry::shutdown_tracer();
    result
}
