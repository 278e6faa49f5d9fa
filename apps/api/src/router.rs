use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};
use payment_cell::{payment_routes, PaymentState};
use pricing_cell::{pricing_routes, PricingState};
use review_cell::{review_routes, ReviewState};

/// Per-cell state handed to the top-level router. Payments are optional so
/// the rest of the API still serves when Stripe is not configured.
pub struct CellStates {
    pub pricing: PricingState,
    pub appointments: AppointmentState,
    pub payments: Option<PaymentState>,
    pub reviews: ReviewState,
}

pub fn create_router(cells: CellStates) -> Router {
    let router = Router::new()
        .route("/", get(|| async { "Marketplace API is running!" }))
        .nest("/pricing", pricing_routes(cells.pricing))
        .nest("/appointments", appointment_routes(cells.appointments))
        .nest("/reviews", review_routes(cells.reviews));

    match cells.payments {
        Some(payments) => router.nest("/payments", payment_routes(payments)),
        None => router,
    }
}
