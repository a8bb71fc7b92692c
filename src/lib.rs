//! # Workout Tracker
//!
//! JSON REST backend for gym members, exercises and workout sessions, backed by
//! `PostgreSQL`.
//!
//! ## Authentication
//!
//! Members register with an email and password. The password is stored as an
//! Argon2id hash and a single-use activation token is issued; only its SHA-256
//! digest is persisted. Redeeming the token activates the account and deletes
//! every other activation token of that member.
//!
//! Activated members exchange their credentials for a stateless HS256 session
//! token (JWT). There is no server-side session store: a session token stays
//! valid until it expires and logging out means discarding it client side.
//!
//! ## Request Pipeline
//!
//! Every request passes, in order, through:
//!
//! 1. the admission limiter (process-local token bucket, `429` when exhausted),
//! 2. the authentication gate (bearer token to [`api::handlers::auth::Identity`]),
//! 3. the authorization gate on routes that need an activated member.
//!
//! Invalid, expired or forged bearer tokens are always reported with the same
//! `401` response so callers can't tell the failure modes apart.

pub mod api;
pub mod cli;
pub mod exercises;
pub mod members;
pub mod storage;
pub mod tokens;
pub mod workouts;

#[cfg(test)]
pub(crate) mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
