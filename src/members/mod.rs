//! Gym members: the credential record and its persistence.

pub mod models;
pub mod password;
pub mod repo;

pub use models::{Member, normalize_email};
pub use password::{Password, PasswordError};
pub use repo::{MemberRepo, PgMemberRepo};
