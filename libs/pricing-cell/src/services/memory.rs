// libs/pricing-cell/src/services/memory.rs
//! In-process `PricingStore` used by tests and local runs without Supabase.
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{PlatformSettings, PricingError, ProfessionalPricing};
use crate::services::store::PricingStore;

#[derive(Default)]
pub struct MemoryPricingStore {
    professionals: RwLock<HashMap<Uuid, ProfessionalPricing>>,
    settings: RwLock<Option<PlatformSettings>>,
}

impl MemoryPricingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_professional_pricing(&self, pricing: ProfessionalPricing) {
        self.professionals.write().await.insert(pricing.professional_id, pricing);
    }

    pub async fn set_platform_settings(&self, settings: PlatformSettings) {
        *self.settings.write().await = Some(settings);
    }
}

#[async_trait]
impl PricingStore for MemoryPricingStore {
    async fn professional_pricing(&self, professional_id: Uuid) -> Result<Option<ProfessionalPricing>, PricingError> {
        Ok(self.professionals.read().await.get(&professional_id).cloned())
    }

    async fn platform_settings(&self) -> Result<Option<PlatformSettings>, PricingError> {
        Ok(self.settings.read().await.clone())
    }

    async fn insert_platform_settings_if_absent(
        &self,
        settings: &PlatformSettings,
    ) -> Result<Option<PlatformSettings>, PricingError> {
        let mut slot = self.settings.write().await;
        if slot.is_some() {
            return Ok(None);
        }
        *slot = Some(settings.clone());
        Ok(Some(settings.clone()))
    }
}
