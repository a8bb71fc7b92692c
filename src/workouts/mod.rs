//! Workout sessions and their per-set details.

pub mod models;
pub mod repo;

pub use models::{Workout, WorkoutDetail};
pub use repo::WorkoutRepo;
