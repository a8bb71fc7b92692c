//! Field validation shared by the handlers.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::api::error::ApiError;
use crate::tokens::PLAINTEXT_LEN;

const NAME_MAX_BYTES: usize = 500;
const PASSWORD_MIN_BYTES: usize = 8;
const PASSWORD_MAX_BYTES: usize = 72;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(
                r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
            )
            .ok()
        })
        .as_ref()
}

/// Collects per-field messages; the first message for a field wins.
#[derive(Debug, Default)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.errors
                .entry(field.to_string())
                .or_insert_with(|| message.to_string());
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// # Errors
    /// `FailedValidation` with every collected message.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(ApiError::FailedValidation(self.errors))
        }
    }
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    email_regex().is_some_and(|regex| regex.is_match(email))
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(valid_email(email), "email", "must be a valid email address");
}

pub fn validate_password(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= PASSWORD_MIN_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= PASSWORD_MAX_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.trim().is_empty(), "name", "must be provided");
    v.check(
        name.len() <= NAME_MAX_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
}

pub fn validate_token_plaintext(v: &mut Validator, token: &str) {
    v.check(!token.is_empty(), "token", "must be provided");
    v.check(
        token.len() == PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
}
