use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Row, postgres::PgRow};
use utoipa::ToSchema;

use super::password::Password;

/// A persisted gym member.
///
/// `version` is the optimistic-concurrency counter: every successful update
/// bumps it and an update presenting a stale value is rejected.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Member {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    pub height: i64,
    pub weight: i64,
    pub version: i32,
}

impl Member {
    /// A not-yet-persisted member. `id` and `version` are assigned on insert.
    #[must_use]
    pub fn new(name: &str, email: &str, password: Password, height: i64, weight: i64) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            password,
            activated: false,
            height,
            weight,
            version: 1,
        }
    }
}

/// Emails are stored trimmed and lowercased so uniqueness is case-insensitive.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl<'r> FromRow<'r, PgRow> for Member {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let hash: String = row.try_get("password_hash")?;
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password: Password::from_hash(hash),
            activated: row.try_get("activated")?,
            height: row.try_get("height")?,
            weight: row.try_get("weight")?,
            version: row.try_get("version")?,
        })
    }
}
