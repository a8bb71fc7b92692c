use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One logged set of an exercise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct WorkoutDetail {
    pub exercise_id: i64,
    pub set: i32,
    pub repetitions: i32,
    pub weight: f64,
}

/// A member's session: a header row plus its sets.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Workout {
    pub id: i64,
    pub member_id: i64,
    pub date: DateTime<Utc>,
    pub details: Vec<WorkoutDetail>,
}
