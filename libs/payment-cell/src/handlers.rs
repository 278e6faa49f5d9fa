// libs/payment-cell/src/handlers.rs
use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use appointment_cell::Actor;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::error::PaymentError;
use crate::models::{CreateIntentRequest, PayoutRequest, RefundRequest};
use crate::services::webhook::{parse_event, verify_signature};
use crate::state::PaymentState;

fn actor_for(user: &User) -> Result<Actor, AppError> {
    match user.role() {
        Some(Role::Admin) => Ok(Actor::Admin),
        Some(Role::Professional) => Ok(Actor::Professional(user.user_id()?)),
        Some(Role::Client) => Ok(Actor::Client(user.user_id()?)),
        None => Err(AppError::Forbidden("User has no marketplace role".to_string())),
    }
}

pub async fn create_payment_intent(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Json<Value>, AppError> {
    let client_id = user.require_role(Role::Client)?;

    let intent = state.payments
        .create_intent(request.appointment_id, client_id, user.email.clone())
        .await?;
    Ok(Json(json!(intent)))
}

pub async fn refund_payment(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_for(&user)?;

    let refund = state.payments
        .refund(request.appointment_id, actor, request.reason)
        .await?;
    Ok(Json(json!(refund)))
}

pub async fn create_payout(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
    Json(request): Json<PayoutRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Only admins can issue payouts".to_string()));
    }

    let payout = state.payments
        .payout(request.professional_id, request.appointment_ids)
        .await?;
    Ok(Json(json!(payout)))
}

pub async fn get_payout_status(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let professional_id = user.require_role(Role::Professional)?;
    let status = state.payments.payout_status(professional_id).await?;
    Ok(Json(json!(status)))
}

pub async fn start_onboarding(
    State(state): State<PaymentState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let professional_id = user.require_role(Role::Professional)?;
    let link = state.payments.onboard(professional_id, user.email.clone()).await?;
    Ok(Json(json!(link)))
}

/// Unauthenticated; trust comes from the `Stripe-Signature` header.
pub async fn stripe_webhook(
    State(state): State<PaymentState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::from(PaymentError::InvalidSignature("missing header".to_string())))?;

    verify_signature(&body, signature, &state.config.stripe_webhook_secret, Utc::now().timestamp())?;
    let event = parse_event(&body)?;
    debug!("Webhook event {} ({})", event.id, event.event_type);

    let outcome = state.payments.handle_event(&event).await?;
    info!("Webhook event {} handled: {:?}", event.id, outcome);

    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
