//! Token endpoints: session login and the mailed single-use tokens.
//!
//! Unknown emails and wrong passwords produce the same `404` on login, and the
//! mail-triggering endpoints always answer `202` with the same message, so
//! none of them can be used to probe which addresses are registered.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::state::AuthState;
use super::types::{
    AuthenticationTokenRequest, AuthenticationTokenResponse, MessageResponse, TokenEmailRequest,
};
use crate::api::email::EmailMessage;
use crate::api::error::ApiError;
use crate::api::handlers::validator::{Validator, validate_email, validate_password};
use crate::members::{Member, Password};
use crate::storage::StoreError;
use crate::tokens::TokenScope;

const TOKEN_SENT_MESSAGE: &str =
    "if the email address is registered, an email will be sent to it with further instructions";

/// Exchange email and password for a session token.
#[utoipa::path(
    post,
    path = "/v1/tokens/authentication",
    request_body = AuthenticationTokenRequest,
    responses(
        (status = 201, description = "Session token issued", body = AuthenticationTokenResponse),
        (status = 400, description = "Malformed body", body = String),
        (status = 404, description = "Unknown email or wrong password", body = String),
        (status = 422, description = "Invalid fields", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "tokens"
)]
#[instrument(skip_all)]
pub async fn create_authentication_token(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<AuthenticationTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let mut v = Validator::new();
    validate_email(&mut v, request.email.trim());
    validate_password(&mut v, &request.password);
    v.finish()?;

    let member = match auth_state.members().get_by_email(&request.email).await {
        Ok(member) => member,
        Err(StoreError::NotFound) => {
            if let Some(decoy) = Password::decoy()
                && let Err(err) = decoy.matches(SecretString::from(request.password)).await
            {
                debug!("decoy password comparison failed: {err}");
            }
            return Err(ApiError::NotFound);
        }
        Err(err) => return Err(err.into()),
    };
    let matched = member
        .password
        .matches(SecretString::from(request.password))
        .await?;
    if !matched {
        return Err(ApiError::NotFound);
    }

    let session = auth_state.sessions().issue(member.id)?;
    info!(member_id = member.id, "session token issued");

    Ok((
        StatusCode::CREATED,
        Json(AuthenticationTokenResponse {
            authentication_token: session.token,
            expiry: session.expiry,
        }),
    ))
}

/// Mail a fresh activation token to a member that isn't activated yet.
#[utoipa::path(
    post,
    path = "/v1/tokens/activation",
    request_body = TokenEmailRequest,
    responses(
        (status = 202, description = "Request accepted", body = MessageResponse),
        (status = 422, description = "Invalid email", body = String)
    ),
    tag = "tokens"
)]
#[instrument(skip_all)]
pub async fn create_activation_token(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<TokenEmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let mut v = Validator::new();
    validate_email(&mut v, request.email.trim());
    v.finish()?;

    if let Some(member) = lookup_member(&auth_state, &request.email).await
        && !member.activated
    {
        send_token(
            &auth_state,
            &member,
            TokenScope::Activation,
            "member_activation",
        )
        .await;
    }

    Ok(accepted())
}

/// Mail a password-reset token to an activated member.
#[utoipa::path(
    post,
    path = "/v1/tokens/password-reset",
    request_body = TokenEmailRequest,
    responses(
        (status = 202, description = "Request accepted", body = MessageResponse),
        (status = 422, description = "Invalid email", body = String)
    ),
    tag = "tokens"
)]
#[instrument(skip_all)]
pub async fn create_password_reset_token(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<TokenEmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let mut v = Validator::new();
    validate_email(&mut v, request.email.trim());
    v.finish()?;

    if let Some(member) = lookup_member(&auth_state, &request.email).await
        && member.activated
    {
        send_token(
            &auth_state,
            &member,
            TokenScope::PasswordReset,
            "password_reset",
        )
        .await;
    }

    Ok(accepted())
}

fn accepted() -> (StatusCode, Json<MessageResponse>) {
    (
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(TOKEN_SENT_MESSAGE)),
    )
}

/// Member for `email`, or `None`. Storage failures are logged, not surfaced.
async fn lookup_member(auth_state: &AuthState, email: &str) -> Option<Member> {
    match auth_state.members().get_by_email(email).await {
        Ok(member) => Some(member),
        Err(StoreError::NotFound) => None,
        Err(err) => {
            error!("Failed to look up member for token request: {err}");
            None
        }
    }
}

/// Issue a `scope` token and hand it to the mailer. Failures are logged only.
async fn send_token(auth_state: &AuthState, member: &Member, scope: TokenScope, template: &str) {
    let ttl = match scope {
        TokenScope::Activation => auth_state.config().activation_token_ttl(),
        TokenScope::PasswordReset => auth_state.config().password_reset_token_ttl(),
    };
    let issued = match auth_state.tokens().issue(member.id, ttl, scope).await {
        Ok(issued) => issued,
        Err(err) => {
            error!(member_id = member.id, scope = %scope, "Failed to issue token: {err}");
            return;
        }
    };

    let token_field = match scope {
        TokenScope::Activation => "activation_token",
        TokenScope::PasswordReset => "password_reset_token",
    };
    let message = EmailMessage {
        to_email: member.email.clone(),
        template: template.to_string(),
        payload: json!({
            "member_id": member.id,
            token_field: issued.plaintext,
        }),
    };
    if let Err(err) = auth_state.mailer().send(&message) {
        error!(member_id = member.id, template, "Failed to send email: {err:#}");
    }
}
