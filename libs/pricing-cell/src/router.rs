// libs/pricing-cell/src/router.rs
use axum::{
    Router,
    routing::get,
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::PricingState;

pub fn pricing_routes(state: PricingState) -> Router {
    let protected_routes = Router::new()
        .route("/settings", get(handlers::get_platform_settings))
        .route("/{professional_id}", get(handlers::resolve_pricing))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
