//! Exercise catalogue.

pub mod models;
pub mod repo;

pub use models::{Exercise, ExerciseCategory};
pub use repo::ExerciseRepo;
