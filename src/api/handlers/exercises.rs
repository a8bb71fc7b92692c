//! Exercise catalogue endpoints. Reads are public; writes need an activated
//! member.

use axum::{
    Json,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

use super::auth::ActivatedMember;
use super::auth::types::MessageResponse;
use super::validator::{Validator, validate_name};
use super::{expected_version, parse_id};
use crate::api::error::ApiError;
use crate::exercises::{Exercise, ExerciseCategory, ExerciseRepo};
use crate::storage::Db;

const DESCRIPTION_MAX_BYTES: usize = 1000;
const CATEGORY_MESSAGE: &str = "must be one of strength, cardio, flexibility, balance";

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct CreateExerciseRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
}

#[derive(ToSchema, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct UpdateExerciseRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(IntoParams, Deserialize, Debug)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ExerciseResponse {
    pub exercise: Exercise,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ExerciseListResponse {
    pub exercises: Vec<Exercise>,
}

fn parse_category(v: &mut Validator, raw: &str) -> Option<ExerciseCategory> {
    let parsed = raw.parse::<ExerciseCategory>().ok();
    v.check(parsed.is_some(), "category", CATEGORY_MESSAGE);
    parsed
}

fn validate_exercise(v: &mut Validator, name: &str, description: &str) {
    validate_name(v, name);
    v.check(
        description.len() <= DESCRIPTION_MAX_BYTES,
        "description",
        "must not be more than 1000 bytes long",
    );
}

#[utoipa::path(
    get,
    path = "/v1/exercises",
    params(CategoryQuery),
    responses(
        (status = 200, description = "Exercises", body = ExerciseListResponse),
        (status = 422, description = "Unknown category", body = String)
    ),
    tag = "exercises"
)]
#[instrument(skip_all)]
pub async fn list_exercises(
    Query(query): Query<CategoryQuery>,
    db: Extension<Db>,
) -> Result<impl IntoResponse, ApiError> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let mut v = Validator::new();
            let category = parse_category(&mut v, raw);
            v.finish()?;
            category
        }
    };
    let exercises = ExerciseRepo::list(&db, category).await?;
    Ok(Json(ExerciseListResponse { exercises }))
}

#[utoipa::path(
    get,
    path = "/v1/exercises/{id}",
    params(("id" = i64, Path, description = "Exercise id")),
    responses(
        (status = 200, description = "Exercise", body = ExerciseResponse),
        (status = 404, description = "No such exercise", body = String)
    ),
    tag = "exercises"
)]
#[instrument(skip_all)]
pub async fn get_exercise(
    Path(raw_id): Path<String>,
    db: Extension<Db>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let exercise = ExerciseRepo::get(&db, id).await?;
    Ok(Json(ExerciseResponse { exercise }))
}

#[utoipa::path(
    post,
    path = "/v1/exercises",
    request_body = CreateExerciseRequest,
    responses(
        (status = 201, description = "Exercise created", body = ExerciseResponse),
        (status = 422, description = "Invalid fields", body = String)
    ),
    security(("bearer" = [])),
    tag = "exercises"
)]
#[instrument(skip_all)]
pub async fn create_exercise(
    _caller: ActivatedMember,
    db: Extension<Db>,
    payload: Result<Json<CreateExerciseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload?;

    let mut v = Validator::new();
    let category = parse_category(&mut v, &request.category);
    validate_exercise(&mut v, request.name.trim(), request.description.trim());
    v.finish()?;
    let category = category.ok_or_else(|| ApiError::invalid_field("category", CATEGORY_MESSAGE))?;

    let mut exercise = Exercise::new(&request.name, category, &request.description);

    ExerciseRepo::insert(&db, &mut exercise).await?;
    info!(exercise_id = exercise.id, "exercise created");
    Ok((StatusCode::CREATED, Json(ExerciseResponse { exercise })))
}

#[utoipa::path(
    put,
    path = "/v1/exercises/{id}",
    params(
        ("id" = i64, Path, description = "Exercise id"),
        ("X-Expected-Version" = Option<i32>, Header, description = "Version the client last read")
    ),
    request_body = UpdateExerciseRequest,
    responses(
        (status = 200, description = "Exercise updated", body = ExerciseResponse),
        (status = 404, description = "No such exercise", body = String),
        (status = 409, description = "Edit conflict", body = String),
        (status = 422, description = "Invalid fields", body = String)
    ),
    security(("bearer" = [])),
    tag = "exercises"
)]
#[instrument(skip_all)]
pub async fn update_exercise(
    _caller: ActivatedMember,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    db: Extension<Db>,
    payload: Result<Json<UpdateExerciseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    let Json(request) = payload?;

    let mut exercise = ExerciseRepo::get(&db, id).await?;
    if let Some(expected) = expected_version(&headers)?
        && expected != exercise.version
    {
        return Err(ApiError::VersionConflict);
    }

    let mut v = Validator::new();
    if let Some(name) = request.name {
        exercise.name = name.trim().to_string();
    }
    if let Some(raw) = request.category
        && let Some(category) = parse_category(&mut v, &raw)
    {
        exercise.category = category;
    }
    if let Some(description) = request.description {
        exercise.description = description.trim().to_string();
    }
    validate_exercise(&mut v, &exercise.name, &exercise.description);
    v.finish()?;

    ExerciseRepo::update(&db, &mut exercise).await?;
    Ok(Json(ExerciseResponse { exercise }))
}

#[utoipa::path(
    delete,
    path = "/v1/exercises/{id}",
    params(("id" = i64, Path, description = "Exercise id")),
    responses(
        (status = 200, description = "Exercise deleted", body = MessageResponse),
        (status = 404, description = "No such exercise", body = String)
    ),
    security(("bearer" = [])),
    tag = "exercises"
)]
#[instrument(skip_all)]
pub async fn delete_exercise(
    _caller: ActivatedMember,
    Path(raw_id): Path<String>,
    db: Extension<Db>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&raw_id)?;
    ExerciseRepo::delete(&db, id).await?;
    info!(exercise_id = id, "exercise deleted");
    Ok(Json(MessageResponse::new("exercise successfully deleted")))
}
