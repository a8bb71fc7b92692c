//! Workout endpoints. All of them need an activated member.

use axum::{
    Json,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::auth::ActivatedMember;
use super::auth::types::MessageResponse;
use super::parse_id;
use super::validator::Validator;
use crate::api::error::ApiError;
use crate::storage::Db;
use crate::workouts::{Workout, WorkoutDetail, WorkoutRepo};

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct CreateWorkoutRequest {
    /// Defaults to the calling member.
    pub member_id: Option<i64>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub details: Vec<WorkoutDetail>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct WorkoutResponse {
    pub workout: Workout,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct WorkoutListResponse {
    pub workouts: Vec<Workout>,
}

fn validate_details(v: &mut Validator, details: &[WorkoutDetail]) {
    for detail in details {
        v.check(
            detail.exercise_id >= 1,
            "details",
            "exercise_id must be a positive integer",
        );
        v.check(detail.set >= 1, "details", "set must be at least 1");
        v.check(
            detail.repetitions >= 0,
            "details",
            "repetitions must not be negative",
        );
        v.check(
            detail.weight.is_finite() && detail.weight >= 0.0,
            "details",
            "weight must be a non-negative number",
        );
    }
}

/// Log a workout with all of its sets in one transaction.
#[utoipa::path(
    post,
    path = "/v1/workouts",
    request_body = CreateWorkoutRequest,
    responses(
        (status = 201, description = "Workout created", body = WorkoutResponse),
        (status = 422, description = "Invalid fields or unknown references", body = String)
    ),
    security(("bearer" = [])),
    tag = "workouts"
)]
#[instrument(skip_all)]
pub async fn create_workout(
    ActivatedMember(caller): ActivatedMember,
    db: Extension<Db>,
    payload: Result<Json<CreateWorkoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;
    let member_id = request.member_id.unwrap_or(caller.id);

    let mut v = Validator::new();
    v.check(member_id >= 1, "member_id", "must be a positive integer");
    validate_details(&mut v, &request.details);
    v.finish()?;

    let mut workout = Workout {
        id: 0,
        member_id,
        date: request.date,
        details: request.details,
    };
    WorkoutRepo::insert(&db, &mut workout).await?;
    info!(
        workout_id = workout.id,
        member_id,
        sets = workout.details.len(),
        "workout created"
    );
    Ok((StatusCode::CREATED, Json(WorkoutResponse { workout })))
}

#[utoipa::path(
    get,
    path = "/v1/members/{id}/workouts",
    params(("id" = i64, Path, description = "Member id")),
    responses(
        (status = 200, description = "Workouts of the member", body = WorkoutListResponse),
        (status = 404, description = "Invalid id", body = String)
    ),
    security(("bearer" = [])),
    tag = "workouts"
)]
#[instrument(skip_all)]
pub async fn list_member_workouts(
    _caller: ActivatedMember,
    Path(raw_id): Path<String>,
    db: Extension<Db>,
) -> Result<impl IntoResponse, ApiError> {
    let member_id = parse_id(&raw_id)?;
    let workouts = WorkoutRepo::list_for_member(&db, member_id).await?;
    Ok(Json(WorkoutListResponse { workouts }))
}

#[utoipa::path(
    delete,
    path = "/v1/workouts/{id}",
    params(("id" = i64, Path, description = "Workout id")),
    responses(
        (status = 200, description = "Workout deleted", body = MessageResponse),
        (status = 404, description = "No such workout", body = String)
    ),
    security(("bearer" = [])),
    tag = "workouts"
)]
#[instrument(skip_all)]
pub async fn delete_workout(
    _caller: ActivatedMember,
    Path(raw_id): Path<String>,
    db: Extension<Db>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    WorkoutRepo::delete(&db, id).await?;
    info!(workout_id = id, "workout deleted");
    Ok(Json(MessageResponse::new("workout successfully deleted")))
}
