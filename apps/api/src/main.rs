use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::AppointmentState;
use payment_cell::PaymentState;
use pricing_cell::PricingState;
use review_cell::ReviewState;
use router::CellStates;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting marketplace API server");

    let config = Arc::new(AppConfig::from_env());
    let supabase = Arc::new(SupabaseClient::new(&config));

    let payments = match PaymentState::from_supabase(config.clone(), supabase.clone()) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Payment routes disabled: {}", e);
            None
        }
    };

    let cells = CellStates {
        pricing: PricingState::from_supabase(config.clone(), supabase.clone()),
        appointments: AppointmentState::from_supabase(config.clone(), supabase.clone()),
        payments,
        reviews: ReviewState::from_supabase(config.clone(), supabase),
    };

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(cells)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
