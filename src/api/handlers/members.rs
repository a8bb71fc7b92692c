//! Member endpoints: registration, activation, password reset and the gated
//! profile CRUD.
//!
//! Flow Overview:
//! 1) Register: validate, hash the password off the executor, insert, issue an
//!    activation token and return its plaintext once.
//! 2) Activate: redeem the token, flip `activated` under the version check,
//!    then delete every activation token of that member.
//! 3) Everything else requires an [`ActivatedMember`].

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::auth::{ActivatedMember, AuthState};
use super::auth::types::MessageResponse;
use super::{expected_version, parse_id};
use super::validator::{
    Validator, validate_email, validate_name, validate_password, validate_token_plaintext,
};
use crate::api::error::ApiError;
use crate::members::{Member, Password, normalize_email};
use crate::tokens::TokenScope;

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct RegisterMemberRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub weight: i64,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisterMemberResponse {
    pub member: Member,
    pub activation_token: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct MemberResponse {
    pub member: Member,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ActivateMemberRequest {
    pub token: String,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub password: String,
    pub token: String,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct UpdateMemberRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub height: Option<i64>,
    pub weight: Option<i64>,
}

#[derive(IntoParams, Deserialize, Debug)]
pub struct EmailQuery {
    pub email: Option<String>,
}

fn validate_body_measurements(v: &mut Validator, height: i64, weight: i64) {
    v.check(height >= 0, "height", "must not be negative");
    v.check(weight >= 0, "weight", "must not be negative");
}

/// Register a member and return the activation token plaintext.
#[utoipa::path(
    post,
    path = "/v1/members",
    request_body = RegisterMemberRequest,
    responses(
        (status = 201, description = "Member registered", body = RegisterMemberResponse),
        (status = 400, description = "Malformed body", body = String),
        (status = 422, description = "Invalid fields or duplicate email", body = String)
    ),
    tag = "members"
)]
#[instrument(skip_all)]
pub async fn register_member(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<RegisterMemberRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let email = normalize_email(&request.email);

    let mut v = Validator::new();
    validate_name(&mut v, &request.name);
    validate_email(&mut v, &email);
    validate_password(&mut v, &request.password);
    validate_body_measurements(&mut v, request.height, request.weight);
    v.finish()?;

    let password = Password::hashed(SecretString::from(request.password)).await?;
    let mut member = Member::new(
        &request.name,
        &email,
        password,
        request.height,
        request.weight,
    );
    auth_state.members().insert(&mut member).await?;

    let issued = auth_state
        .tokens()
        .issue(
            member.id,
            auth_state.config().activation_token_ttl(),
            TokenScope::Activation,
        )
        .await?;
    info!(member_id = member.id, "member registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterMemberResponse {
            member,
            activation_token: issued.plaintext,
        }),
    ))
}

/// Redeem an activation token for the member in the path.
#[utoipa::path(
    put,
    path = "/v1/members/{id}/activate",
    params(("id" = i64, Path, description = "Member id")),
    request_body = ActivateMemberRequest,
    responses(
        (status = 200, description = "Member activated", body = MemberResponse),
        (status = 401, description = "Invalid, expired or used token", body = String),
        (status = 404, description = "Invalid id", body = String),
        (status = 409, description = "Edit conflict", body = String),
        (status = 422, description = "Malformed token", body = String)
    ),
    tag = "members"
)]
#[instrument(skip_all)]
pub async fn activate_member(
    Path(raw_id): Path<String>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<ActivateMemberRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(request) = payload?;
    let token = request.token.trim();

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, token);
    v.finish()?;

    let mut member = auth_state
        .tokens()
        .redeem(TokenScope::Activation, token)
        .await?;
    if member.id != id {
        return Err(ApiError::InvalidToken);
    }

    member.activated = true;
    auth_state.members().update(&mut member).await?;
    auth_state
        .tokens()
        .invalidate_all(TokenScope::Activation, member.id)
        .await?;
    info!(member_id = member.id, "member activated");

    Ok(Json(MemberResponse { member }))
}

/// Set a new password with a password-reset token.
#[utoipa::path(
    put,
    path = "/v1/members/password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 401, description = "Invalid, expired or used token", body = String),
        (status = 409, description = "Edit conflict", body = String),
        (status = 422, description = "Invalid fields", body = String)
    ),
    tag = "members"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let token = request.token.trim().to_string();

    let mut v = Validator::new();
    validate_password(&mut v, &request.password);
    validate_token_plaintext(&mut v, &token);
    v.finish()?;

    let mut member = auth_state
        .tokens()
        .redeem(TokenScope::PasswordReset, &token)
        .await?;
    member.password = Password::hashed(SecretString::from(request.password)).await?;
    auth_state.members().update(&mut member).await?;
    auth_state
        .tokens()
        .invalidate_all(TokenScope::PasswordReset, member.id)
        .await?;
    info!(member_id = member.id, "member password reset");

    Ok(Json(MessageResponse::new(
        "your password was successfully reset",
    )))
}

/// The calling member.
#[utoipa::path(
    get,
    path = "/v1/members/me",
    responses(
        (status = 200, description = "Current member", body = MemberResponse),
        (status = 401, description = "Not authenticated", body = String),
        (status = 403, description = "Account not activated", body = String)
    ),
    security(("bearer" = [])),
    tag = "members"
)]
pub async fn current_member(ActivatedMember(member): ActivatedMember) -> Json<MemberResponse> {
    Json(MemberResponse { member })
}

/// Look a member up by email.
#[utoipa::path(
    get,
    path = "/v1/members",
    params(EmailQuery),
    responses(
        (status = 200, description = "Member found", body = MemberResponse),
        (status = 400, description = "Missing email parameter", body = String),
        (status = 404, description = "No such member", body = String)
    ),
    security(("bearer" = [])),
    tag = "members"
)]
#[instrument(skip_all)]
pub async fn member_by_email(
    _caller: ActivatedMember,
    Query(query): Query<EmailQuery>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let email = query
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing email parameter".to_string()))?;
    let member = auth_state.members().get_by_email(email).await?;
    Ok(Json(MemberResponse { member }))
}

/// Partially update a member under optimistic concurrency.
///
/// An `X-Expected-Version` header lets the client assert the version it read.
#[utoipa::path(
    put,
    path = "/v1/members/{id}",
    params(
        ("id" = i64, Path, description = "Member id"),
        ("X-Expected-Version" = Option<i32>, Header, description = "Version the client last read")
    ),
    request_body = UpdateMemberRequest,
    responses(
        (status = 200, description = "Member updated", body = MemberResponse),
        (status = 404, description = "No such member", body = String),
        (status = 409, description = "Edit conflict", body = String),
        (status = 422, description = "Invalid fields", body = String)
    ),
    security(("bearer" = [])),
    tag = "members"
)]
#[instrument(skip_all)]
pub async fn update_member(
    _caller: ActivatedMember,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<UpdateMemberRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(request) = payload?;

    let mut member = auth_state.members().get_by_id(id).await?;
    if let Some(expected) = expected_version(&headers)?
        && expected != member.version
    {
        return Err(ApiError::VersionConflict);
    }

    if let Some(name) = request.name {
        member.name = name.trim().to_string();
    }
    if let Some(email) = request.email {
        member.email = normalize_email(&email);
    }
    if let Some(height) = request.height {
        member.height = height;
    }
    if let Some(weight) = request.weight {
        member.weight = weight;
    }

    let mut v = Validator::new();
    validate_name(&mut v, &member.name);
    validate_email(&mut v, &member.email);
    validate_body_measurements(&mut v, member.height, member.weight);
    v.finish()?;

    auth_state.members().update(&mut member).await?;
    Ok(Json(MemberResponse { member }))
}

#[utoipa::path(
    delete,
    path = "/v1/members/{id}",
    params(("id" = i64, Path, description = "Member id")),
    responses(
        (status = 200, description = "Member deleted", body = MessageResponse),
        (status = 404, description = "No such member", body = String)
    ),
    security(("bearer" = [])),
    tag = "members"
)]
#[instrument(skip_all)]
pub async fn delete_member(
    _caller: ActivatedMember,
    Path(raw_id): Path<String>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    auth_state.members().delete(id).await?;
    info!(member_id = id, "member deleted");
    Ok(Json(MessageResponse::new("member successfully deleted")))
}
