//! API handlers and shared helpers.

pub mod auth;
pub mod exercises;
pub mod health;
pub mod members;
pub mod validator;
pub mod workouts;

use axum::http::HeaderMap;

use crate::api::error::ApiError;

const EXPECTED_VERSION_HEADER: &str = "x-expected-version";

/// Parse a path id. Anything that isn't an integer >= 1 is `404`.
///
/// # Errors
/// Returns `ApiError::NotFound` for unparseable or non-positive ids.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}

/// Version the client claims to have read, from `X-Expected-Version`.
///
/// # Errors
/// Returns `ApiError::BadRequest` when the header isn't an integer.
pub fn expected_version(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
    let Some(value) = headers.get(EXPECTED_VERSION_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<i32>().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest("invalid X-Expected-Version header".to_string()))
}
