// libs/pricing-cell/src/services/pricing.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{PlatformSettings, PricingError, PricingSource, ResolvedPricing, TherapyType};
use crate::services::store::PricingStore;

pub struct PricingService {
    store: Arc<dyn PricingStore>,
}

impl PricingService {
    pub fn new(store: Arc<dyn PricingStore>) -> Self {
        Self { store }
    }

    /// Loads the settings singleton, creating it with defaults on first read.
    pub async fn platform_settings(&self) -> Result<PlatformSettings, PricingError> {
        if let Some(settings) = self.store.platform_settings().await? {
            return Ok(settings);
        }

        info!("No platform settings found, creating defaults");
        if let Some(created) = self.store
            .insert_platform_settings_if_absent(&PlatformSettings::default())
            .await?
        {
            return Ok(created);
        }

        // Lost the insert race; the winner's row is there now.
        self.store.platform_settings().await?.ok_or_else(|| {
            warn!("Platform settings missing after concurrent creation");
            PricingError::StoreError("Platform settings could not be loaded".to_string())
        })
    }

    /// Session price, fee and payout for a professional and therapy type,
    /// falling back to platform defaults when the professional has no price.
    pub async fn resolve_pricing(
        &self,
        professional_id: Uuid,
        therapy_type: TherapyType,
    ) -> Result<ResolvedPricing, PricingError> {
        debug!("Resolving {} pricing for professional {}", therapy_type, professional_id);

        let settings = self.platform_settings().await?;
        let professional_price = self.store
            .professional_pricing(professional_id)
            .await?
            .and_then(|pricing| pricing.price_for(therapy_type));

        let (price, source) = match professional_price {
            Some(price) => (price, PricingSource::Professional),
            None => (settings.default_price_for(therapy_type), PricingSource::Platform),
        };

        let resolved = ResolvedPricing::split(
            therapy_type,
            price,
            settings.platform_fee_percentage,
            &settings.currency,
            source,
        )?;

        info!(
            "Resolved {} pricing for professional {}: {} {} (fee {}, payout {}, source {:?})",
            therapy_type, professional_id, resolved.price, resolved.currency,
            resolved.platform_fee, resolved.professional_payout, resolved.source
        );

        Ok(resolved)
    }
}
