// libs/appointment-cell/src/handlers.rs
use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, BookAppointmentRequest, GeneralPoolFilters, RefuseAppointmentRequest,
    UpdateStatusRequest,
};
use crate::services::lifecycle::Actor;
use crate::state::AppointmentState;

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        let message = e.to_string();
        match e {
            AppointmentError::NotFound => AppError::NotFound(message),
            AppointmentError::AlreadyAssigned
            | AppointmentError::NotPending(_)
            | AppointmentError::AlreadyRefused
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::ProfessionalRequired => AppError::Conflict(message),
            AppointmentError::NotEligible
            | AppointmentError::PreviouslyRefused
            | AppointmentError::NotProposed
            | AppointmentError::Unauthorized(_) => AppError::Forbidden(message),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

fn actor_for(user: &User) -> Result<Actor, AppError> {
    match user.role() {
        Some(Role::Admin) => Ok(Actor::Admin),
        Some(Role::Professional) => Ok(Actor::Professional(user.user_id()?)),
        Some(Role::Client) => Ok(Actor::Client(user.user_id()?)),
        None => Err(AppError::Forbidden("User has no marketplace role".to_string())),
    }
}

// ==============================================================================
// BOOKING & LIFECYCLE HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // Clients book for themselves; admins may book for anyone.
    if !user.is_admin() {
        let client_id = user.require_role(Role::Client)?;
        if request.client_id != client_id {
            return Err(AppError::Forbidden("Clients can only book for themselves".to_string()));
        }
    }

    let appointment = state.booking.book_appointment(request).await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;

    if !user.is_admin() {
        let user_id = user.user_id()?;
        let participant = appointment.client_id == user_id
            || appointment.professional_id == Some(user_id)
            || appointment.proposed_to.contains(&user_id);
        if !participant {
            return Err(AppError::Forbidden("Not a participant in this appointment".to_string()));
        }
    }

    Ok(Json(json!(appointment)))
}

pub async fn update_status(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;
    let appointment = state.booking
        .update_status(appointment_id, actor, request.status)
        .await?;
    Ok(Json(json!(appointment)))
}

// ==============================================================================
// ROUTING HANDLERS
// ==============================================================================

pub async fn accept_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let professional_id = user.require_role(Role::Professional)?;
    let appointment = state.routing.accept(appointment_id, professional_id).await?;
    Ok(Json(json!(appointment)))
}

pub async fn refuse_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let professional_id = user.require_role(Role::Professional)?;

    // The reason is optional, and so is the body carrying it.
    let request: RefuseAppointmentRequest = if body.is_empty() {
        RefuseAppointmentRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid refusal body: {}", e)))?
    };
    let reason = request.reason;

    let outcome = state.routing.refuse(appointment_id, professional_id, reason).await?;
    Ok(Json(json!(outcome)))
}

pub async fn get_general_pool(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(filters): Query<GeneralPoolFilters>,
) -> Result<Json<Value>, AppError> {
    let professional_id = user.require_role(Role::Professional)?;
    debug!("General pool for {} with filters {:?}", professional_id, filters);

    let appointments = state.routing.general_pool(professional_id, filters).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}

pub async fn get_proposed(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let professional_id = user.require_role(Role::Professional)?;

    let appointments = state.routing.proposed_to(professional_id).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
    })))
}
