use chrono::{DateTime, Utc};
use std::fmt;

/// Purpose a token was issued for. A token only redeems under its own scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Activation,
    PasswordReset,
}

impl TokenScope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activation => "activation",
            Self::PasswordReset => "password-reset",
        }
    }

    /// Parse the persisted `tokens.scope` value.
    pub(crate) fn from_db(value: &str) -> Result<Self, sqlx::Error> {
        match value {
            "activation" => Ok(Self::Activation),
            "password-reset" => Ok(Self::PasswordReset),
            _ => Err(sqlx::Error::Decode(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid tokens.scope value: {value}"),
            )))),
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stored half of an opaque token. Only the digest is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub hash: Vec<u8>,
    pub member_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

impl TokenRecord {
    /// Valid only while `expiry` is strictly after `now`.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry > now
    }
}

/// A freshly issued token. `plaintext` exists only here and is handed to the
/// member exactly once.
#[derive(Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub record: TokenRecord,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"***")
            .field("record", &self.record)
            .finish()
    }
}
