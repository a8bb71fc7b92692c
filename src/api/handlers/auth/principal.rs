//! Request identity: the authentication and authorization gates.
//!
//! Flow Overview: `authenticate` turns the `Authorization` header into an
//! [`Identity`] and stores it in the request extensions. Gated handlers take
//! an [`ActivatedMember`] argument, which reads that identity back and only
//! lets activated members through.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderValue, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, instrument};

use super::session::parse_member_id;
use super::state::AuthState;
use crate::api::error::ApiError;
use crate::members::Member;
use crate::storage::StoreError;

/// Who is making the request.
#[derive(Clone, Debug)]
pub enum Identity {
    Anonymous,
    Authenticated(Member),
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// `Ok(None)` when the header is absent or empty. Anything else that isn't
/// exactly two space-separated parts with a literal `Bearer` scheme is
/// `InvalidToken`.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ApiError::InvalidToken)?;
    if value.is_empty() {
        return Ok(None);
    }
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(Some(token)),
        _ => Err(ApiError::InvalidToken),
    }
}

/// Resolve the request headers into an identity.
///
/// # Errors
/// `InvalidToken` for a malformed header, a token that fails verification, a
/// subject that isn't a member id or a member that no longer exists. Any other
/// storage failure is `Internal`.
#[instrument(skip_all)]
pub async fn resolve_identity(state: &AuthState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let Some(token) = bearer_token(headers)? else {
        return Ok(Identity::Anonymous);
    };

    let subject = state.sessions().verify(token)?;
    let member_id = parse_member_id(&subject)?;

    match state.members().get_by_id(member_id).await {
        Ok(member) => Ok(Identity::Authenticated(member)),
        Err(StoreError::NotFound) => Err(ApiError::InvalidToken),
        Err(err) => Err(ApiError::internal(err)),
    }
}

/// Authentication gate middleware.
///
/// Every response, including rejections, carries `Vary: Authorization`.
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match resolve_identity(&state, request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Authorization decision for an already resolved identity.
///
/// # Errors
/// `AuthenticationRequired` for anonymous callers, `InactiveAccount` for
/// members that haven't activated yet.
pub fn authorize(identity: &Identity) -> Result<&Member, ApiError> {
    match identity {
        Identity::Anonymous => Err(ApiError::AuthenticationRequired),
        Identity::Authenticated(member) if !member.activated => Err(ApiError::InactiveAccount),
        Identity::Authenticated(member) => Ok(member),
    }
}

/// The authenticated identity, whatever it is. Anonymous callers included.
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                error!("identity missing from request: authentication gate is not installed");
                ApiError::internal(anyhow::anyhow!("authentication gate not installed"))
            })
    }
}

/// Authorization gate. Only an activated member gets past this extractor.
#[derive(Clone, Debug)]
pub struct ActivatedMember(pub Member);

impl<S> FromRequestParts<S> for ActivatedMember
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentIdentity(identity) = CurrentIdentity::from_request_parts(parts, state).await?;
        authorize(&identity).cloned().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::Password;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(value) {
            headers.insert(header::AUTHORIZATION, value);
        }
        headers
    }

    fn member(activated: bool) -> Member {
        let mut member = Member::new("Ada", "a@x.com", Password::default(), 170, 60);
        member.id = 1;
        member.activated = activated;
        member
    }

    #[test]
    fn missing_or_empty_header_is_anonymous() {
        assert!(matches!(bearer_token(&HeaderMap::new()), Ok(None)));
        assert!(matches!(bearer_token(&headers("")), Ok(None)));
    }

    #[test]
    fn well_formed_bearer_yields_the_token() {
        assert!(matches!(bearer_token(&headers("Bearer abc.def.ghi")), Ok(Some("abc.def.ghi"))));
    }

    #[test]
    fn malformed_headers_are_invalid_tokens() {
        for value in [
            "Bearer",
            "Bearer ",
            "Basic abc",
            "bearer abc",
            "Bearer a b",
            "Bearer  abc",
            "Token",
        ] {
            assert!(
                matches!(bearer_token(&headers(value)), Err(ApiError::InvalidToken)),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn authorize_requires_an_activated_member() {
        assert!(matches!(
            authorize(&Identity::Anonymous),
            Err(ApiError::AuthenticationRequired)
        ));
        assert!(matches!(
            authorize(&Identity::Authenticated(member(false))),
            Err(ApiError::InactiveAccount)
        ));
        assert!(matches!(
            authorize(&Identity::Authenticated(member(true))),
            Ok(member) if member.id == 1
        ));
    }

    #[tokio::test]
    async fn extractor_without_gate_is_a_server_error() {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        let result = ActivatedMember::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[tokio::test]
    async fn extractor_reads_the_identity_from_extensions() {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        parts
            .extensions
            .insert(Identity::Authenticated(member(true)));
        let result = ActivatedMember::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Ok(ActivatedMember(member)) if member.id == 1));
    }
}
