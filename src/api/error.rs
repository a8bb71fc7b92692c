//! HTTP-facing error outcome.
//!
//! Every handler and gate returns `ApiError` on failure. Client-visible
//! messages are fixed strings; server-side detail is only ever logged.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::error;

use super::handlers::auth::session::SessionError;
use crate::members::PasswordError;
use crate::storage::StoreError;
use crate::tokens::TokenError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid or missing authentication token")]
    InvalidToken,
    #[error("you must be authenticated to access this resource")]
    AuthenticationRequired,
    #[error("your member account must be activated to access this resource")]
    InactiveAccount,
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("unable to update the record due to an edit conflict, please try again")]
    VersionConflict,
    #[error("{0}")]
    BadRequest(String),
    #[error("failed validation")]
    FailedValidation(BTreeMap<String, String>),
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("the server encountered a problem and could not process your request")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    /// Single-field validation failure.
    pub fn invalid_field(field: &str, message: &str) -> Self {
        Self::FailedValidation(BTreeMap::from([(field.to_string(), message.to_string())]))
    }

    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidToken | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::InactiveAccount => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::VersionConflict => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::FailedValidation(errors) => json!({ "error": errors }),
            Self::Internal(err) => {
                error!("request failed: {err:#}");
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, Self::InvalidToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound,
            StoreError::VersionConflict => Self::VersionConflict,
            StoreError::DuplicateEmail => {
                Self::invalid_field("email", "a member with this email address already exists")
            }
            StoreError::MissingReference => {
                Self::invalid_field("reference", "must refer to an existing record")
            }
            err @ (StoreError::Timeout(_) | StoreError::Database(_)) => Self::Internal(err.into()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotFound => Self::InvalidToken,
            TokenError::Storage(err) => err.into(),
            err @ (TokenError::Entropy(_) | TokenError::ExpiryOutOfRange) => {
                Self::Internal(err.into())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken => Self::InvalidToken,
            err @ SessionError::Signing(_) => Self::Internal(err.into()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> Result<serde_json::Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[test]
    fn statuses_follow_the_taxonomy() {
        let cases = [
            (ApiError::InvalidToken, StatusCode::UNAUTHORIZED),
            (ApiError::AuthenticationRequired, StatusCode::UNAUTHORIZED),
            (ApiError::InactiveAccount, StatusCode::FORBIDDEN),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::VersionConflict, StatusCode::CONFLICT),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::invalid_field("a", "b"), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::RateLimitExceeded, StatusCode::TOO_MANY_REQUESTS),
            (ApiError::internal(anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status);
        }
    }

    #[tokio::test]
    async fn invalid_token_sets_www_authenticate() -> Result<()> {
        let response = ApiError::InvalidToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static("Bearer"))
        );
        let body = body_json(response).await?;
        assert_eq!(body["error"], "invalid or missing authentication token");
        Ok(())
    }

    #[tokio::test]
    async fn internal_errors_never_leak_detail() -> Result<()> {
        let response = ApiError::internal(anyhow!("password_hash column missing")).into_response();
        let body = body_json(response).await?;
        let text = body.to_string();
        assert!(!text.contains("password_hash"));
        assert_eq!(
            body["error"],
            "the server encountered a problem and could not process your request"
        );
        Ok(())
    }

    #[tokio::test]
    async fn validation_errors_carry_the_field_map() -> Result<()> {
        let response = ApiError::from(StoreError::DuplicateEmail).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await?;
        assert_eq!(
            body["error"]["email"],
            "a member with this email address already exists"
        );
        Ok(())
    }

    #[test]
    fn token_and_store_errors_map_without_leaking() {
        assert!(matches!(
            ApiError::from(TokenError::NotFound),
            ApiError::InvalidToken
        ));
        assert!(matches!(
            ApiError::from(TokenError::Storage(StoreError::VersionConflict)),
            ApiError::VersionConflict
        ));
        assert!(matches!(
            ApiError::from(StoreError::Timeout(std::time::Duration::from_secs(3))),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(SessionError::InvalidToken),
            ApiError::InvalidToken
        ));
    }
}
