use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseCategory {
    Strength,
    Cardio,
    Flexibility,
    Balance,
}

impl ExerciseCategory {
    pub const ALL: [Self; 4] = [
        Self::Strength,
        Self::Cardio,
        Self::Flexibility,
        Self::Balance,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strength => "strength",
            Self::Cardio => "cardio",
            Self::Flexibility => "flexibility",
            Self::Balance => "balance",
        }
    }
}

impl fmt::Display for ExerciseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExerciseCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value.trim().to_lowercase())
            .ok_or_else(|| format!("unknown exercise category: {value}"))
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct Exercise {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub category: ExerciseCategory,
    pub description: String,
    pub version: i32,
}

impl Exercise {
    /// A not-yet-persisted exercise.
    #[must_use]
    pub fn new(name: &str, category: ExerciseCategory, description: &str) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            name: name.trim().to_string(),
            category,
            description: description.trim().to_string(),
            version: 1,
        }
    }
}

impl<'r> FromRow<'r, PgRow> for Exercise {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let category: String = row.try_get("category")?;
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            name: row.try_get("name")?,
            category: category.parse().map_err(|err: String| {
                sqlx::Error::Decode(Box::new(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid exercises.category value: {err}"),
                )))
            })?,
            description: row.try_get("description")?,
            version: row.try_get("version")?,
        })
    }
}
