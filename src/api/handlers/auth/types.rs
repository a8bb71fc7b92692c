//! Request/response types for token endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct AuthenticationTokenRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct AuthenticationTokenResponse {
    pub authentication_token: String,
    pub expiry: DateTime<Utc>,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct TokenEmailRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}
