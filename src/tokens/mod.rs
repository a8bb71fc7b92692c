//! Opaque single-use tokens (activation, password reset).

pub mod models;
pub mod repo;
pub mod service;

pub use models::{IssuedToken, TokenRecord, TokenScope};
pub use repo::{PgTokenRepo, TokenRepo};
pub use service::{PLAINTEXT_LEN, TokenError, TokenIssuer};
