//! One-way password hashing (Argon2id, fixed cost).
//!
//! Only the PHC-encoded hash is ever stored. Hashing is CPU bound and takes
//! tens of milliseconds on purpose, so the async helpers move it onto the
//! blocking pool instead of stalling the executor.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{self, SaltString, rand_core::OsRng},
};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, sync::OnceLock};

// OWASP baseline for Argon2id.
const MEMORY_COST_KIB: u32 = 19_456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

static DECOY: OnceLock<Option<Password>> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hashing(password_hash::Error),
    #[error("password hash is not set")]
    Unset,
    #[error("stored password hash is malformed: {0}")]
    Malformed(password_hash::Error),
    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|err| PasswordError::Hashing(err.into()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Password record of a member. Holds the hash only; plaintext never lives here.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password {
    hash: Option<String>,
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("hash", &self.hash.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Password {
    /// Wrap a hash loaded from storage.
    #[must_use]
    pub fn from_hash(hash: String) -> Self {
        Self { hash: Some(hash) }
    }

    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Derive a salted hash of `plaintext` and keep it.
    ///
    /// # Errors
    /// Returns `PasswordError::Hashing` if the hasher itself fails.
    pub fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = hasher()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(PasswordError::Hashing)?;
        self.hash = Some(hash.to_string());
        Ok(())
    }

    /// Check `candidate` against the stored hash.
    ///
    /// A mismatch is `Ok(false)`; an unset or malformed hash is an error.
    ///
    /// # Errors
    /// Returns `PasswordError::Unset` or `PasswordError::Malformed`.
    pub fn compare(&self, candidate: &str) -> Result<bool, PasswordError> {
        let hash = self
            .hash
            .as_deref()
            .filter(|hash| !hash.is_empty())
            .ok_or(PasswordError::Unset)?;
        let parsed = PasswordHash::new(hash).map_err(PasswordError::Malformed)?;
        match hasher()?.verify_password(candidate.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordError::Malformed(err)),
        }
    }

    /// Hash `plaintext` on the blocking pool.
    ///
    /// # Errors
    /// Returns an error if hashing fails or the blocking task panics.
    pub async fn hashed(plaintext: SecretString) -> Result<Self, PasswordError> {
        tokio::task::spawn_blocking(move || {
            let mut password = Self::default();
            password.set(plaintext.expose_secret())?;
            Ok(password)
        })
        .await?
    }

    /// Fixed record with the production cost parameters. Comparing against it
    /// makes a login for an unknown email cost as much as a wrong password.
    #[must_use]
    pub fn decoy() -> Option<&'static Self> {
        DECOY
            .get_or_init(|| {
                let mut password = Self::default();
                password.set("decoy-password-never-assigned").ok()?;
                Some(password)
            })
            .as_ref()
    }

    /// [`Password::compare`] on the blocking pool.
    ///
    /// # Errors
    /// Same as [`Password::compare`], plus task failures.
    pub async fn matches(&self, candidate: SecretString) -> Result<bool, PasswordError> {
        let record = self.clone();
        tokio::task::spawn_blocking(move || record.compare(candidate.expose_secret())).await?
    }
}
