pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::{
    PlatformSettings, PricingError, PricingSource, ProfessionalPricing, ResolvedPricing,
    TherapyType,
};
pub use router::pricing_routes;
pub use services::pricing::PricingService;
pub use services::store::{PricingStore, SupabasePricingStore};
pub use state::PricingState;
