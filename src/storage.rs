//! Shared database handle and the error taxonomy used by every repository.
//!
//! All statements go through [`Db::run`], which bounds them by the configured
//! query timeout. When the timeout fires the in-flight future is dropped,
//! which cancels the statement and hands the connection back to the pool.

use sqlx::PgPool;
use std::{future::Future, time::Duration};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const MEMBERS_EMAIL_CONSTRAINT: &str = "members_email_key";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("edit conflict: the record was modified concurrently")]
    VersionConflict,
    #[error("a member with this email address already exists")]
    DuplicateEmail,
    #[error("the record references a row that does not exist")]
    MissingReference,
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            err if violates(&err, MEMBERS_EMAIL_CONSTRAINT) => Self::DuplicateEmail,
            err if has_code(&err, FOREIGN_KEY_VIOLATION) => Self::MissingReference,
            err => Self::Database(err),
        }
    }
}

fn has_code(err: &sqlx::Error, expected: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == expected),
        _ => false,
    }
}

/// True when `err` is a unique violation raised by `constraint`.
fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    has_code(err, UNIQUE_VIOLATION)
        && matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

/// Span wrapping a single SQL statement.
pub fn query_span(operation: &str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Connection pool plus the per-statement timeout.
#[derive(Clone, Debug)]
pub struct Db {
    pool: PgPool,
    query_timeout: Duration,
}

impl Db {
    #[must_use]
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Await `fut` for at most the query timeout.
    ///
    /// # Errors
    /// Returns `StoreError::Timeout` when the deadline passes, otherwise the
    /// mapped database error.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.query_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::error::{DatabaseError, ErrorKind};
    use sqlx::postgres::PgPoolOptions;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: &'static str,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[test]
    fn email_unique_violation_maps_to_duplicate_email() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: "23505",
            constraint: Some("members_email_key"),
        }));
        assert!(matches!(StoreError::from(err), StoreError::DuplicateEmail));
    }

    #[test]
    fn other_violations_stay_database_errors() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: "23505",
            constraint: Some("tokens_pkey"),
        }));
        assert!(matches!(StoreError::from(err), StoreError::Database(_)));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: "23514",
            constraint: Some("members_email_key"),
        }));
        assert!(matches!(StoreError::from(err), StoreError::Database(_)));
    }

    #[test]
    fn foreign_key_violations_map_to_missing_reference() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: "23503",
            constraint: Some("workout_details_exercise_id_fkey"),
        }));
        assert!(matches!(StoreError::from(err), StoreError::MissingReference));
    }

    #[tokio::test]
    async fn run_times_out_slow_statements() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let db = Db::new(pool, Duration::from_millis(10));
        let result: Result<(), StoreError> = db
            .run(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::Timeout(limit)) if limit == Duration::from_millis(10)));
        Ok(())
    }
}
