//! Opaque single-use tokens: issue, redeem, invalidate.
//!
//! The plaintext is 16 random bytes rendered as unpadded RFC 4648 base-32
//! (26 characters, case-insensitive). Storage only ever sees its SHA-256
//! digest, so redeeming is recompute-and-lookup.

use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::models::{IssuedToken, TokenRecord, TokenScope};
use super::repo::TokenRepo;
use crate::members::Member;
use crate::storage::StoreError;

const ENTROPY_BYTES: usize = 16;

/// Length of every plaintext this issuer produces.
pub const PLAINTEXT_LEN: usize = 26;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token not found")]
    NotFound,
    #[error(transparent)]
    Storage(StoreError),
    #[error("failed to gather token entropy: {0}")]
    Entropy(rand::Error),
    #[error("token lifetime out of range")]
    ExpiryOutOfRange,
}

impl From<StoreError> for TokenError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            err => Self::Storage(err),
        }
    }
}

/// Random plaintext for a new token.
///
/// # Errors
/// Returns `TokenError::Entropy` if the OS RNG fails.
pub fn generate_plaintext() -> Result<String, TokenError> {
    let mut bytes = [0u8; ENTROPY_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(TokenError::Entropy)?;
    Ok(base32::encode(
        base32::Alphabet::Rfc4648 { padding: false },
        &bytes,
    ))
}

/// Storage digest of a plaintext.
#[must_use]
pub fn hash_plaintext(plaintext: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hasher.finalize().to_vec()
}

#[derive(Clone)]
pub struct TokenIssuer {
    repo: Arc<dyn TokenRepo>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(repo: Arc<dyn TokenRepo>) -> Self {
        Self { repo }
    }

    /// Issue a token for `member_id`, valid for `ttl` under `scope`.
    ///
    /// The plaintext in the result must reach the member out of band and is
    /// never logged.
    ///
    /// # Errors
    /// `TokenError::ExpiryOutOfRange` if `now + ttl` is not representable,
    /// entropy failure or any storage error, unmodified.
    pub async fn issue(
        &self,
        member_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<IssuedToken, TokenError> {
        let expiry = Utc::now()
            .checked_add_signed(ttl)
            .ok_or(TokenError::ExpiryOutOfRange)?;
        let plaintext = generate_plaintext()?;
        let record = TokenRecord {
            hash: hash_plaintext(&plaintext),
            member_id,
            expiry,
            scope,
        };
        self.repo.insert(&record).await.map_err(TokenError::Storage)?;
        tracing::debug!(member_id, scope = %scope, "issued token");
        Ok(IssuedToken { plaintext, record })
    }

    /// Look up the live token for `candidate` and return its owner.
    ///
    /// # Errors
    /// `TokenError::NotFound` for wrong, expired, consumed or out-of-scope
    /// tokens; storage errors otherwise.
    pub async fn redeem(&self, scope: TokenScope, candidate: &str) -> Result<Member, TokenError> {
        self.redeem_at(scope, candidate, Utc::now()).await
    }

    pub(crate) async fn redeem_at(
        &self,
        scope: TokenScope,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<Member, TokenError> {
        let normalized = candidate.trim().to_ascii_uppercase();
        let hash = hash_plaintext(&normalized);
        let (_, member) = self.repo.find(&hash, scope, now).await?;
        Ok(member)
    }

    /// Delete every `scope` token of `member_id`.
    ///
    /// # Errors
    /// Any storage error, unmodified.
    pub async fn invalidate_all(&self, scope: TokenScope, member_id: i64) -> Result<(), TokenError> {
        self.repo
            .delete_all_for_member(scope, member_id)
            .await
            .map_err(TokenError::Storage)
    }
}
