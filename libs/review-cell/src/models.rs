// libs/review-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryRatings {
    pub communication: Option<i32>,
    pub professionalism: Option<i32>,
    pub effectiveness: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub client_id: Uuid,
    pub professional_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    #[serde(default)]
    pub categories: Option<CategoryRatings>,
    #[serde(default)]
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReviewRequest {
    pub appointment_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub categories: Option<CategoryRatings>,
    #[serde(default)]
    pub anonymous: bool,
}

fn check_rating(name: &str, value: i32) -> Result<(), ReviewError> {
    if !(MIN_RATING..=MAX_RATING).contains(&value) {
        return Err(ReviewError::ValidationError(format!(
            "{} must be between {} and {}",
            name, MIN_RATING, MAX_RATING
        )));
    }
    Ok(())
}

impl SubmitReviewRequest {
    pub fn validate(&self) -> Result<(), ReviewError> {
        check_rating("rating", self.rating)?;

        if let Some(ref categories) = self.categories {
            for (name, value) in [
                ("communication", categories.communication),
                ("professionalism", categories.professionalism),
                ("effectiveness", categories.effectiveness),
            ] {
                if let Some(value) = value {
                    check_rating(name, value)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReviewError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Only the client of this appointment can do this")]
    NotAppointmentClient,

    #[error("Only completed appointments can be reviewed")]
    NotCompleted,

    #[error("Only paid appointments can be reviewed")]
    NotPaid,

    #[error("Appointment has no assigned professional")]
    NoProfessional,

    #[error("Appointment has already been reviewed")]
    AlreadyReviewed,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
