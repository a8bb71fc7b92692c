//! Stateless session tokens (HS256 JWT).
//!
//! A session token carries the member id as `sub` plus issuer, audience and
//! the `iat`/`nbf`/`exp` window. Nothing is stored server side: verification
//! is a signature check and a clock comparison, so a token stays valid for its
//! whole lifetime and logging out means the client drops it.
//!
//! Every verification failure collapses into [`SessionError::InvalidToken`];
//! callers must not learn whether the signature, encoding or a claim was wrong.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    get_current_timestamp,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid or expired session token")]
    InvalidToken,
    #[error("failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iss: String,
    aud: Vec<String>,
    iat: u64,
    nbf: u64,
    exp: u64,
}

/// A signed session token and the instant it stops verifying.
pub struct SessionToken {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &"***")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Issues and verifies session tokens with one process-wide secret.
///
/// The issuer string doubles as the audience.
#[derive(Clone)]
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
    validation: Validation,
}

impl fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCodec")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    #[must_use]
    pub fn new(secret: &SecretString, issuer: &str, ttl: Duration) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            issuer: issuer.to_string(),
            ttl,
            validation,
        }
    }

    /// Sign a session token for `member_id`, valid from now for the lifetime.
    ///
    /// # Errors
    /// Returns `SessionError::Signing` if encoding fails.
    pub fn issue(&self, member_id: i64) -> Result<SessionToken, SessionError> {
        self.issue_at(member_id, get_current_timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        member_id: i64,
        issued_at: u64,
    ) -> Result<SessionToken, SessionError> {
        let expires_at = issued_at.saturating_add(self.ttl.as_secs());
        let claims = SessionClaims {
            sub: member_id.to_string(),
            iss: self.issuer.clone(),
            aud: vec![self.issuer.clone()],
            iat: issued_at,
            nbf: issued_at,
            exp: expires_at,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(SessionError::Signing)?;
        let expiry = i64::try_from(expires_at)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok(SessionToken { token, expiry })
    }

    /// Check signature, time window, issuer and audience. Returns the subject.
    ///
    /// # Errors
    /// Returns `SessionError::InvalidToken` for every failure.
    pub fn verify(&self, token: &str) -> Result<String, SessionError> {
        decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|err| {
                tracing::debug!(kind = ?err.kind(), "session token rejected");
                SessionError::InvalidToken
            })
    }
}

/// Parse a verified subject into a member id.
///
/// A subject that isn't a positive integer is attacker input, so it is
/// `InvalidToken` rather than a server error.
///
/// # Errors
/// Returns `SessionError::InvalidToken` when the subject is not an id >= 1.
pub fn parse_member_id(subject: &str) -> Result<i64, SessionError> {
    match subject.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(SessionError::InvalidToken),
    }
}
