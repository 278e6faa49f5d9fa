// libs/payment-cell/src/router.rs
use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::PaymentState;

pub fn payment_routes(state: PaymentState) -> Router {
    let public_routes = Router::new()
        .route("/webhook", post(handlers::stripe_webhook));

    let protected_routes = Router::new()
        .route("/intent", post(handlers::create_payment_intent))
        .route("/refund", post(handlers::refund_payment))
        .route("/payouts", post(handlers::create_payout))
        .route("/payouts/status", get(handlers::get_payout_status))
        .route("/connect/onboard", post(handlers::start_onboarding))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
