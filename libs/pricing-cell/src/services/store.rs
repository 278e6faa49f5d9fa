// libs/pricing-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{PlatformSettings, PricingError, ProfessionalPricing};

/// Read access to pricing reference data plus the one idempotent write the
/// resolver needs (creating the settings singleton).
#[async_trait]
pub trait PricingStore: Send + Sync {
    async fn professional_pricing(&self, professional_id: Uuid) -> Result<Option<ProfessionalPricing>, PricingError>;

    async fn platform_settings(&self) -> Result<Option<PlatformSettings>, PricingError>;

    /// Inserts `settings` unless a row with the same key exists. Returns the
    /// inserted row, or `None` when another writer got there first.
    async fn insert_platform_settings_if_absent(
        &self,
        settings: &PlatformSettings,
    ) -> Result<Option<PlatformSettings>, PricingError>;
}

pub struct SupabasePricingStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePricingStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

fn store_error(e: anyhow::Error) -> PricingError {
    PricingError::StoreError(e.to_string())
}

#[async_trait]
impl PricingStore for SupabasePricingStore {
    async fn professional_pricing(&self, professional_id: Uuid) -> Result<Option<ProfessionalPricing>, PricingError> {
        let path = format!("/rest/v1/professional_pricing?professional_id=eq.{}&limit=1", professional_id);
        let rows: Vec<ProfessionalPricing> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().next())
    }

    async fn platform_settings(&self) -> Result<Option<PlatformSettings>, PricingError> {
        let path = format!("/rest/v1/platform_settings?key=eq.{}&limit=1", PlatformSettings::SINGLETON_KEY);
        let rows: Vec<PlatformSettings> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().next())
    }

    async fn insert_platform_settings_if_absent(
        &self,
        settings: &PlatformSettings,
    ) -> Result<Option<PlatformSettings>, PricingError> {
        debug!("Creating default platform settings");

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=ignore-duplicates,return=representation"),
        );

        let rows: Vec<PlatformSettings> = self.supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/platform_settings?on_conflict=key",
                None,
                Some(json!(settings)),
                Some(headers),
            )
            .await
            .map_err(store_error)?;

        Ok(rows.into_iter().next())
    }
}
