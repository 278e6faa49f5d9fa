// libs/appointment-cell/src/router.rs
use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: AppointmentState) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        // Routing
        .route("/general", get(handlers::get_general_pool))
        .route("/proposed", get(handlers::get_proposed))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/accept", post(handlers::accept_appointment))
        .route("/{appointment_id}/refuse", post(handlers::refuse_appointment))
        // Lifecycle
        .route("/{appointment_id}/status", patch(handlers::update_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
