// libs/review-cell/src/state.rs
use std::sync::Arc;

use appointment_cell::{AppointmentStore, SupabaseAppointmentStore};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::services::review::ReviewService;
use crate::services::store::{ReviewStore, SupabaseReviewStore};

#[derive(Clone)]
pub struct ReviewState {
    pub config: Arc<AppConfig>,
    pub reviews: Arc<ReviewService>,
}

impl ReviewState {
    pub fn new(
        config: Arc<AppConfig>,
        appointments: Arc<dyn AppointmentStore>,
        reviews: Arc<dyn ReviewStore>,
    ) -> Self {
        Self {
            config,
            reviews: Arc::new(ReviewService::new(appointments, reviews)),
        }
    }

    pub fn from_supabase(config: Arc<AppConfig>, supabase: Arc<SupabaseClient>) -> Self {
        Self::new(
            config,
            Arc::new(SupabaseAppointmentStore::new(supabase.clone())),
            Arc::new(SupabaseReviewStore::new(supabase)),
        )
    }
}
