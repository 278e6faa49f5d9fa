// libs/payment-cell/src/state.rs
use std::sync::Arc;

use appointment_cell::{AppointmentStore, SupabaseAppointmentStore};
use pricing_cell::{PricingService, SupabasePricingStore};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::PaymentError;
use crate::services::accounts::{SupabaseAccountStore, SupabaseReconciliationStore};
use crate::services::gateway::PaymentGateway;
use crate::services::notification::PaymentNotifier;
use crate::services::payment::{ConnectUrls, PaymentDependencies, PaymentService};
use crate::services::stripe::StripeClient;

#[derive(Clone)]
pub struct PaymentState {
    pub config: Arc<AppConfig>,
    pub payments: Arc<PaymentService>,
}

impl PaymentState {
    pub fn new(config: Arc<AppConfig>, payments: PaymentService) -> Self {
        Self {
            config,
            payments: Arc::new(payments),
        }
    }

    pub fn connect_urls(config: &AppConfig) -> ConnectUrls {
        ConnectUrls {
            refresh_url: config.connect_refresh_url.clone(),
            return_url: config.connect_return_url.clone(),
        }
    }

    /// Supabase-backed stores with the given gateway.
    pub fn with_gateway(
        config: Arc<AppConfig>,
        supabase: Arc<SupabaseClient>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let appointments: Arc<dyn AppointmentStore> = Arc::new(SupabaseAppointmentStore::new(supabase.clone()));
        let payments = PaymentService::new(PaymentDependencies {
            appointments,
            accounts: Arc::new(SupabaseAccountStore::new(supabase.clone())),
            reconciliations: Arc::new(SupabaseReconciliationStore::new(supabase.clone())),
            gateway,
            pricing: Arc::new(PricingService::new(Arc::new(SupabasePricingStore::new(supabase)))),
            notifier: Arc::new(PaymentNotifier::new(&config)),
            connect: Self::connect_urls(&config),
        });
        Self::new(config, payments)
    }

    pub fn from_supabase(config: Arc<AppConfig>, supabase: Arc<SupabaseClient>) -> Result<Self, PaymentError> {
        let gateway = Arc::new(StripeClient::new(&config)?);
        Ok(Self::with_gateway(config, supabase, gateway))
    }
}
