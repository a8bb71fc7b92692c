//! Auth state and configuration shared by the gates and the token handlers.

use chrono::Duration;
use std::sync::Arc;

use super::{rate_limit::RateLimiter, session::SessionCodec};
use crate::api::email::EmailSender;
use crate::members::MemberRepo;
use crate::tokens::{TokenIssuer, TokenRepo};

const DEFAULT_ACTIVATION_TOKEN_TTL_SECONDS: i64 = 3 * 24 * 60 * 60;
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECONDS: i64 = 45 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    activation_token_ttl_seconds: i64,
    password_reset_token_ttl_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            activation_token_ttl_seconds: DEFAULT_ACTIVATION_TOKEN_TTL_SECONDS,
            password_reset_token_ttl_seconds: DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_activation_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.activation_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_password_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.password_reset_token_ttl_seconds = seconds;
        self
    }

    pub(crate) fn activation_token_ttl(&self) -> Duration {
        seconds_saturating(self.activation_token_ttl_seconds)
    }

    pub(crate) fn password_reset_token_ttl(&self) -> Duration {
        seconds_saturating(self.password_reset_token_ttl_seconds)
    }
}

/// Out-of-range values become `Duration::MAX`; the issuer rejects the
/// resulting expiry instead of panicking.
fn seconds_saturating(seconds: i64) -> Duration {
    Duration::try_seconds(seconds).unwrap_or(Duration::MAX)
}

/// Everything the auth pipeline needs, built once at startup.
pub struct AuthState {
    config: AuthConfig,
    sessions: SessionCodec,
    members: Arc<dyn MemberRepo>,
    tokens: TokenIssuer,
    rate_limiter: Arc<dyn RateLimiter>,
    mailer: Arc<dyn EmailSender>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        sessions: SessionCodec,
        members: Arc<dyn MemberRepo>,
        tokens: Arc<dyn TokenRepo>,
        rate_limiter: Arc<dyn RateLimiter>,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            config,
            sessions,
            members,
            tokens: TokenIssuer::new(tokens),
            rate_limiter,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCodec {
        &self.sessions
    }

    pub(crate) fn members(&self) -> &dyn MemberRepo {
        self.members.as_ref()
    }

    pub(crate) fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub(crate) fn rate_limiter(&self) -> Arc<dyn RateLimiter> {
        Arc::clone(&self.rate_limiter)
    }

    pub(crate) fn mailer(&self) -> &dyn EmailSender {
        self.mailer.as_ref()
    }
}
