//! Opaque token persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row};
use tracing::Instrument;

use super::models::{TokenRecord, TokenScope};
use crate::members::Member;
use crate::storage::{Db, StoreError, query_span};

#[async_trait]
pub trait TokenRepo: Send + Sync {
    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError>;

    /// The live token matching `hash` and `scope` together with its owner.
    ///
    /// Wrong hash, wrong scope, expired and already consumed tokens are all
    /// `StoreError::NotFound`.
    async fn find(
        &self,
        hash: &[u8],
        scope: TokenScope,
        now: DateTime<Utc>,
    ) -> Result<(TokenRecord, Member), StoreError>;

    async fn delete_all_for_member(
        &self,
        scope: TokenScope,
        member_id: i64,
    ) -> Result<(), StoreError>;
}

#[derive(Clone, Debug)]
pub struct PgTokenRepo {
    db: Db,
}

impl PgTokenRepo {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenRepo for PgTokenRepo {
    async fn insert(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let query = "INSERT INTO tokens (hash, member_id, expiry, scope) VALUES ($1, $2, $3, $4)";
        self.db
            .run(
                sqlx::query(query)
                    .bind(&record.hash)
                    .bind(record.member_id)
                    .bind(record.expiry)
                    .bind(record.scope.as_str())
                    .execute(self.db.pool())
                    .instrument(query_span("INSERT", query)),
            )
            .await?;
        Ok(())
    }

    async fn find(
        &self,
        hash: &[u8],
        scope: TokenScope,
        now: DateTime<Utc>,
    ) -> Result<(TokenRecord, Member), StoreError> {
        let query = r"
            SELECT tokens.hash, tokens.member_id, tokens.expiry, tokens.scope,
                   members.id, members.created_at, members.name, members.email,
                   members.password_hash, members.activated, members.height,
                   members.weight, members.version
            FROM tokens
            INNER JOIN members ON members.id = tokens.member_id
            WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > $3
        ";
        let row = self
            .db
            .run(
                sqlx::query(query)
                    .bind(hash)
                    .bind(scope.as_str())
                    .bind(now)
                    .fetch_one(self.db.pool())
                    .instrument(query_span("SELECT", query)),
            )
            .await?;

        let decode = || -> Result<(TokenRecord, Member), sqlx::Error> {
            let scope: String = row.try_get("scope")?;
            let record = TokenRecord {
                hash: row.try_get("hash")?,
                member_id: row.try_get("member_id")?,
                expiry: row.try_get("expiry")?,
                scope: TokenScope::from_db(&scope)?,
            };
            Ok((record, Member::from_row(&row)?))
        };
        decode().map_err(StoreError::from)
    }

    async fn delete_all_for_member(
        &self,
        scope: TokenScope,
        member_id: i64,
    ) -> Result<(), StoreError> {
        let query = "DELETE FROM tokens WHERE scope = $1 AND member_id = $2";
        self.db
            .run(
                sqlx::query(query)
                    .bind(scope.as_str())
                    .bind(member_id)
                    .execute(self.db.pool())
                    .instrument(query_span("DELETE", query)),
            )
            .await?;
        Ok(())
    }
}
