//! Process-wide admission limiter.
//!
//! One token bucket is shared by every request this process serves. It runs
//! in front of authentication, so an exhausted bucket costs neither a token
//! verification nor a member lookup. Each instance keeps its own bucket.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::warn;

use crate::api::error::ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Refills `rate` permits per second up to `burst`; one permit per request.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// A full bucket. `rate` must be positive and `burst` at least 1; the CLI
    /// rejects anything else before this is built.
    #[must_use]
    pub fn new(rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst);
        Self {
            rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Refill up to `now`, then take one permit if there is one.
    ///
    /// Refill and take happen under one lock, so two callers can never both
    /// get the last permit.
    pub fn allow_at(&self, now: Instant) -> RateLimitDecision {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        bucket.tokens = elapsed
            .as_secs_f64()
            .mul_add(self.rate, bucket.tokens)
            .min(self.burst);
        bucket.refilled_at = bucket.refilled_at.max(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }
}

impl RateLimiter for TokenBucket {
    fn check(&self) -> RateLimitDecision {
        self.allow_at(Instant::now())
    }
}

/// Admission middleware. Rejects with `429` once the bucket is empty.
///
/// Rejections never reach the authentication gate, so `Vary` is set here.
pub async fn admit(
    State(limiter): State<Arc<dyn RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        RateLimitDecision::Allowed => next.run(request).await,
        RateLimitDecision::Limited => {
            warn!(path = %request.uri().path(), "request rejected by admission limiter");
            let mut response = ApiError::RateLimitExceeded.into_response();
            response
                .headers_mut()
                .append(header::VARY, HeaderValue::from_static("Authorization"));
            response
        }
    }
}
