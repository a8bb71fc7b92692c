use chrono::{DateTime, Utc};
use sqlx::{Execute, Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use tracing::Instrument;

use super::models::{Workout, WorkoutDetail};
use crate::storage::{Db, StoreError, query_span};

pub struct WorkoutRepo;

impl WorkoutRepo {
    /// Inserts the workout header and all of its details in one transaction.
    ///
    /// Either every row lands or none does; a timeout drops the transaction,
    /// which rolls it back.
    ///
    /// # Errors
    /// `StoreError::MissingReference` for unknown members or exercises.
    pub async fn insert(db: &Db, workout: &mut Workout) -> Result<(), StoreError> {
        let pool = db.pool();
        let member_id = workout.member_id;
        let date = workout.date;
        let details = &workout.details;

        let id = db
            .run(async move {
                let mut tx = pool.begin().await?;

                let query = "INSERT INTO workouts (member_id, date) VALUES ($1, $2) RETURNING id";
                let id: i64 = sqlx::query_scalar(query)
                    .bind(member_id)
                    .bind(date)
                    .fetch_one(&mut *tx)
                    .instrument(query_span("INSERT", query))
                    .await?;

                if !details.is_empty() {
                    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                        "INSERT INTO workout_details (workout_id, exercise_id, set_number, repetitions, weight) ",
                    );
                    builder.push_values(details, |mut row, detail| {
                        row.push_bind(id)
                            .push_bind(detail.exercise_id)
                            .push_bind(detail.set)
                            .push_bind(detail.repetitions)
                            .push_bind(detail.weight);
                    });
                    let statement = builder.build();
                    let span = query_span("INSERT", statement.sql());
                    statement.execute(&mut *tx).instrument(span).await?;
                }

                tx.commit().await?;
                Ok::<_, sqlx::Error>(id)
            })
            .await?;

        workout.id = id;
        Ok(())
    }

    /// Every workout of `member_id`, newest first, details ordered by set.
    ///
    /// # Errors
    /// Returns an error if a statement fails or times out.
    pub async fn list_for_member(db: &Db, member_id: i64) -> Result<Vec<Workout>, StoreError> {
        let query = "SELECT id, member_id, date FROM workouts WHERE member_id = $1 ORDER BY date DESC, id DESC";
        let rows = db
            .run(
                sqlx::query(query)
                    .bind(member_id)
                    .fetch_all(db.pool())
                    .instrument(query_span("SELECT", query)),
            )
            .await?;

        let mut workouts = rows
            .iter()
            .map(|row| {
                Ok(Workout {
                    id: row.try_get("id")?,
                    member_id: row.try_get("member_id")?,
                    date: row.try_get::<DateTime<Utc>, _>("date")?,
                    details: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        if workouts.is_empty() {
            return Ok(workouts);
        }

        let ids: Vec<i64> = workouts.iter().map(|workout| workout.id).collect();
        let query = r"
            SELECT workout_id, exercise_id, set_number, repetitions, weight
            FROM workout_details
            WHERE workout_id = ANY($1)
            ORDER BY workout_id, set_number, id
        ";
        let rows = db
            .run(
                sqlx::query(query)
                    .bind(&ids[..])
                    .fetch_all(db.pool())
                    .instrument(query_span("SELECT", query)),
            )
            .await?;

        let mut details: HashMap<i64, Vec<WorkoutDetail>> = HashMap::new();
        for row in &rows {
            let workout_id: i64 = row.try_get("workout_id")?;
            details.entry(workout_id).or_default().push(WorkoutDetail {
                exercise_id: row.try_get("exercise_id")?,
                set: row.try_get("set_number")?,
                repetitions: row.try_get("repetitions")?,
                weight: row.try_get("weight")?,
            });
        }
        for workout in &mut workouts {
            workout.details = details.remove(&workout.id).unwrap_or_default();
        }
        Ok(workouts)
    }

    /// Deletes a workout; its details go with it (`ON DELETE CASCADE`).
    ///
    /// # Errors
    /// `StoreError::NotFound` when nothing was deleted.
    pub async fn delete(db: &Db, id: i64) -> Result<(), StoreError> {
        let query = "DELETE FROM workouts WHERE id = $1";
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
