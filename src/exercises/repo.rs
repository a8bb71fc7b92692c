use tracing::Instrument;

use super::models::{Exercise, ExerciseCategory};
use crate::storage::{Db, StoreError, query_span};

const EXERCISE_COLUMNS: &str = "id, created_at, name, category, description, version";

pub struct ExerciseRepo;

impl ExerciseRepo {
    /// Inserts `exercise`, filling in `id`, `created_at` and `version`.
    ///
    /// # Errors
    /// Returns an error if the statement fails or times out.
    pub async fn insert(db: &Db, exercise: &mut Exercise) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO exercises (name, category, description)
            VALUES ($1, $2, $3)
            RETURNING id, created_at, version
        ";
        let row: (i64, chrono::DateTime<chrono::Utc>, i32) = db
            .run(
                sqlx::query_as(query)
                    .bind(&exercise.name)
                    .bind(exercise.category.as_str())
                    .bind(&exercise.description)
                    .fetch_one(db.pool())
                    .instrument(query_span("INSERT", query)),
            )
            .await?;
        (exercise.id, exercise.created_at, exercise.version) = row;
        Ok(())
    }

    /// # Errors
    /// `StoreError::NotFound` when no exercise has this id.
    pub async fn get(db: &Db, id: i64) -> Result<Exercise, StoreError> {
        let query = format!("SELECT {EXERCISE_COLUMNS} FROM exercises WHERE id = $1");
        db.run(
            sqlx::query_as::<_, Exercise>(&query)
                .bind(id)
                .fetch_one(db.pool())
                .instrument(query_span("SELECT", &query)),
        )
        .await
    }

    /// Every exercise, optionally narrowed to one category, ordered by id.
    ///
    /// # Errors
    /// Returns an error if the statement fails or times out.
    pub async fn list(
        db: &Db,
        category: Option<ExerciseCategory>,
    ) -> Result<Vec<Exercise>, StoreError> {
        let query = format!(
            "SELECT {EXERCISE_COLUMNS} FROM exercises WHERE ($1::text IS NULL OR category = $1) ORDER BY id"
        );
        db.run(
            sqlx::query_as::<_, Exercise>(&query)
                .bind(category.map(ExerciseCategory::as_str))
                .fetch_all(db.pool())
                .instrument(query_span("SELECT", &query)),
        )
        .await
    }

    /// Compare-and-swap update keyed on `(id, version)`.
    ///
    /// # Errors
    /// `StoreError::VersionConflict` when the version moved since it was read.
    pub async fn update(db: &Db, exercise: &mut Exercise) -> Result<(), StoreError> {
        let query = r"
            UPDATE exercises
            SET name = $1, category = $2, description = $3, version = version + 1
            WHERE id = $4 AND version = $5
            RETURNING version
        ";
        let version: Option<i32> = db
            .run(
                sqlx::query_scalar(query)
                    .bind(&exercise.name)
                    .bind(exercise.category.as_str())
                    .bind(&exercise.description)
                    .bind(exercise.id)
                    .bind(exercise.version)
                    .fetch_optional(db.pool())
                    .instrument(query_span("UPDATE", query)),
            )
            .await?;
        exercise.version = version.ok_or(StoreError::VersionConflict)?;
        Ok(())
    }

    /// # Errors
    /// `StoreError::NotFound` when nothing was deleted.
    pub async fn delete(db: &Db, id: i64) -> Result<(), StoreError> {
        let query = "DELETE FROM exercises WHERE id = $1";
        let result = db
            .run(
                sqlx::query(query)
                    .bind(id)
                    .execute(db.pool())
                    .instrument(query_span("DELETE", query)),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
