//! Member persistence.

use async_trait::async_trait;
use tracing::Instrument;

use super::models::{Member, normalize_email};
use crate::storage::{Db, StoreError, query_span};

const MEMBER_COLUMNS: &str =
    "id, created_at, name, email, password_hash, activated, height, weight, version";

/// Member lookups and writes the auth core depends on.
#[async_trait]
pub trait MemberRepo: Send + Sync {
    /// Insert `member`, filling in `id`, `created_at` and `version`.
    async fn insert(&self, member: &mut Member) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: i64) -> Result<Member, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Member, StoreError>;

    /// Compare-and-swap update keyed on `(id, version)`.
    ///
    /// On success `member.version` holds the new counter. A moved counter is
    /// `StoreError::VersionConflict`.
    async fn update(&self, member: &mut Member) -> Result<(), StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

/// `PostgreSQL` backed [`MemberRepo`].
#[derive(Clone, Debug)]
pub struct PgMemberRepo {
    db: Db,
}

impl PgMemberRepo {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MemberRepo for PgMemberRepo {
    async fn insert(&self, member: &mut Member) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO members (name, email, password_hash, activated, height, weight)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created_at, version
        ";
        let row: (i64, chrono::DateTime<chrono::Utc>, i32) = self
            .db
            .run(
                sqlx::query_as(query)
                    .bind(&member.name)
                    .bind(&member.email)
                    .bind(member.password.hash())
                    .bind(member.activated)
                    .bind(member.height)
                    .bind(member.weight)
                    .fetch_one(self.db.pool())
                    .instrument(query_span("INSERT", query)),
            )
            .await?;
        (member.id, member.created_at, member.version) = row;
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<Member, StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let query = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1");
        self.db
            .run(
                sqlx::query_as::<_, Member>(&query)
                    .bind(id)
                    .fetch_one(self.db.pool())
                    .instrument(query_span("SELECT", &query)),
            )
            .await
    }

    async fn get_by_email(&self, email: &str) -> Result<Member, StoreError> {
        let email = normalize_email(email);
        let query = format!("SELECT {MEMBER_COLUMNS} FROM members WHERE email = $1");
        self.db
            .run(
                sqlx::query_as::<_, Member>(&query)
                    .bind(email)
                    .fetch_one(self.db.pool())
                    .instrument(query_span("SELECT", &query)),
            )
            .await
    }

    async fn update(&self, member: &mut Member) -> Result<(), StoreError> {
        let query = r"
            UPDATE members
            SET name = $1, email = $2, password_hash = $3, activated = $4,
                height = $5, weight = $6, version = version + 1
            WHERE id = $7 AND version = $8
            RETURNING version
        ";
        let version: Option<i32> = self
            .db
            .run(
                sqlx::query_scalar(query)
                    .bind(&member.name)
                    .bind(&member.email)
                    .bind(member.password.hash())
                    .bind(member.activated)
                    .bind(member.height)
                    .bind(member.weight)
                    .bind(member.id)
                    .bind(member.version)
                    .fetch_optional(self.db.pool())
                    .instrument(query_span("UPDATE", query)),
            )
            .await?;
        member.version = version.ok_or(StoreError::VersionConflict)?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        if id < 1 {
            return Err(StoreError::NotFound);
        }
        let query = "DELETE FROM members WHERE id = $1";
        let result = self
            .db
            .run(
                sqlx::query(query)
                    .bind(id)
                    .execute(self.db.pool())
                    .instrument(query_span("DELETE", query)),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
