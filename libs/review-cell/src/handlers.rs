// libs/review-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{ReviewError, SubmitReviewRequest};
use crate::state::ReviewState;

impl From<ReviewError> for AppError {
    fn from(e: ReviewError) -> Self {
        let message = e.to_string();
        match e {
            ReviewError::AppointmentNotFound => AppError::NotFound(message),
            ReviewError::NotAppointmentClient => AppError::Forbidden(message),
            ReviewError::NotCompleted
            | ReviewError::NotPaid
            | ReviewError::NoProfessional
            | ReviewError::AlreadyReviewed => AppError::Conflict(message),
            ReviewError::ValidationError(msg) => AppError::ValidationError(msg),
            ReviewError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

pub async fn submit_review(
    State(state): State<ReviewState>,
    Extension(user): Extension<User>,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let client_id = user.require_role(Role::Client)?;
    let review = state.reviews.submit_review(client_id, request).await?;
    Ok((StatusCode::CREATED, Json(json!(review))))
}

pub async fn get_review(
    State(state): State<ReviewState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let client_id = user.user_id()?;
    let review = state.reviews.get_review(appointment_id, client_id).await?;
    Ok(Json(json!({ "review": review })))
}
