//! Authentication core and the token endpoints.
//!
//! Request pipeline (outermost first):
//!
//! 1. [`rate_limit::admit`]: process-wide token bucket, `429` when empty.
//! 2. [`principal::authenticate`]: bearer token to [`Identity`].
//! 3. [`ActivatedMember`] extractor on gated handlers.
//!
//! ## Session Tokens
//!
//! Session tokens are HS256 JWTs signed with one process-wide secret. There
//! is no revocation list; a token stays valid until `exp`.
//!
//! ## Opaque Tokens
//!
//! Activation and password-reset tokens are random, single use and stored
//! only as a SHA-256 digest. See [`crate::tokens`].

pub(crate) mod principal;
pub(crate) mod rate_limit;
pub(crate) mod session;
mod state;
pub(crate) mod tokens;
pub(crate) mod types;

pub use principal::{ActivatedMember, CurrentIdentity, Identity};
pub use rate_limit::{NoopRateLimiter, RateLimitDecision, RateLimiter, TokenBucket};
pub use session::{SessionCodec, SessionError};
pub use state::{AuthConfig, AuthState};
