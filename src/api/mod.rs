use crate::api::handlers::auth::{
    AuthConfig, AuthState, RateLimiter, SessionCodec, principal::authenticate, rate_limit::admit,
};
use crate::members::PgMemberRepo;
use crate::storage::Db;
use crate::tokens::PgTokenRepo;
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn_with_state,
};
use sqlx::postgres::PgPoolOptions;
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod email;
pub mod error;
pub mod handlers;
mod openapi;

#[cfg(test)]
mod tests;

pub use openapi::openapi;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1_048_576;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Deployment environment, reported by the health check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Self; 3] = [Self::Development, Self::Staging, Self::Production];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|env| env.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow!("unknown environment: {s}"))
    }
}

/// Connection settings for the `PostgreSQL` pool.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub dsn: String,
    pub max_connections: u32,
    pub query_timeout: Duration,
}

/// The full application: documented routes, the auth pipeline and the
/// ambient layers.
///
/// Layers run outermost first: request id, trace span, body limit, admission
/// limiter, authentication gate, handler.
pub fn app(db: Db, environment: Environment, auth_state: Arc<AuthState>) -> Router {
    let (router, _openapi) = router().split_for_parts();

    router
        .layer(from_fn_with_state(auth_state.clone(), authenticate))
        .layer(from_fn_with_state(auth_state.rate_limiter(), admit))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
                .layer(Extension(auth_state))
                .layer(Extension(db))
                .layer(Extension(environment)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    database: DatabaseConfig,
    environment: Environment,
    sessions: SessionCodec,
    auth_config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(database.max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&database.dsn)
        .await
        .context("Failed to connect to database")?;
    let db = Db::new(pool, database.query_timeout);

    let auth_state = Arc::new(AuthState::new(
        auth_config,
        sessions,
        Arc::new(PgMemberRepo::new(db.clone())),
        Arc::new(PgTokenRepo::new(db.clone())),
        rate_limiter,
        Arc::new(email::LogEmailSender),
    ));

    let app = app(db, environment, auth_state);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!(%environment, "Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received ctrl-c"),
        () = terminate => info!("Received SIGTERM"),
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
