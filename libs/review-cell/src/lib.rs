pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::{CategoryRatings, Review, ReviewError, SubmitReviewRequest};
pub use router::review_routes;
pub use services::review::ReviewService;
pub use services::store::{ReviewStore, SupabaseReviewStore};
pub use state::ReviewState;
