// libs/pricing-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::services::pricing::PricingService;
use crate::services::store::{PricingStore, SupabasePricingStore};

#[derive(Clone)]
pub struct PricingState {
    pub config: Arc<AppConfig>,
    pub pricing: Arc<PricingService>,
}

impl PricingState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn PricingStore>) -> Self {
        Self {
            config,
            pricing: Arc::new(PricingService::new(store)),
        }
    }

    pub fn from_supabase(config: Arc<AppConfig>, supabase: Arc<SupabaseClient>) -> Self {
        Self::new(config, Arc::new(SupabasePricingStore::new(supabase)))
    }
}
