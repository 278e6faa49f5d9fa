pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use error::PaymentError;
pub use router::payment_routes;
pub use services::accounts::{AccountStore, ReconciliationStore};
pub use services::gateway::PaymentGateway;
pub use services::payment::{ConnectUrls, PaymentDependencies, PaymentService};
pub use services::stripe::StripeClient;
pub use state::PaymentState;
