// libs/review-cell/src/router.rs
use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::ReviewState;

pub fn review_routes(state: ReviewState) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::submit_review))
        .route("/{appointment_id}", get(handlers::get_review))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
