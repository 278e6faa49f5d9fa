// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::services::booking::AppointmentBookingService;
use crate::services::routing::RoutingService;
use crate::services::store::{AppointmentStore, SupabaseAppointmentStore};

#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AppointmentStore>,
    pub booking: Arc<AppointmentBookingService>,
    pub routing: Arc<RoutingService>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            config,
            booking: Arc::new(AppointmentBookingService::new(store.clone())),
            routing: Arc::new(RoutingService::new(store.clone())),
            store,
        }
    }

    pub fn from_supabase(config: Arc<AppConfig>, supabase: Arc<SupabaseClient>) -> Self {
        Self::new(config, Arc::new(SupabaseAppointmentStore::new(supabase)))
    }
}
