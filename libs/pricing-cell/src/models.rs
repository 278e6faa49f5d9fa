// libs/pricing-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// THERAPY TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TherapyType {
    Solo,
    Couple,
    Group,
}

impl TherapyType {
    pub const ALL: [TherapyType; 3] = [TherapyType::Solo, TherapyType::Couple, TherapyType::Group];
}

impl fmt::Display for TherapyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TherapyType::Solo => write!(f, "solo"),
            TherapyType::Couple => write!(f, "couple"),
            TherapyType::Group => write!(f, "group"),
        }
    }
}

// ==============================================================================
// REFERENCE DATA
// ==============================================================================

/// Per-professional overrides; `None` or non-positive means "use platform default".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfessionalPricing {
    pub professional_id: Uuid,
    #[serde(rename = "solo_price")]
    pub solo: Option<i64>,
    #[serde(rename = "couple_price")]
    pub couple: Option<i64>,
    #[serde(rename = "group_price")]
    pub group: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfessionalPricing {
    pub fn price_for(&self, therapy_type: TherapyType) -> Option<i64> {
        let price = match therapy_type {
            TherapyType::Solo => self.solo,
            TherapyType::Couple => self.couple,
            TherapyType::Group => self.group,
        };
        price.filter(|p| *p > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultPrices {
    pub solo: i64,
    pub couple: i64,
    pub group: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformSettings {
    pub key: String,
    pub default_prices: DefaultPrices,
    pub platform_fee_percentage: f64,
    pub currency: String,
    pub free_cancellation_hours: i32,
    pub late_cancellation_fee_percentage: f64,
}

impl PlatformSettings {
    pub const SINGLETON_KEY: &'static str = "global";

    pub fn default_price_for(&self, therapy_type: TherapyType) -> i64 {
        match therapy_type {
            TherapyType::Solo => self.default_prices.solo,
            TherapyType::Couple => self.default_prices.couple,
            TherapyType::Group => self.default_prices.group,
        }
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            key: Self::SINGLETON_KEY.to_string(),
            default_prices: DefaultPrices {
                solo: 120,
                couple: 150,
                group: 80,
            },
            platform_fee_percentage: 10.0,
            currency: "CAD".to_string(),
            free_cancellation_hours: 24,
            late_cancellation_fee_percentage: 50.0,
        }
    }
}

// ==============================================================================
// RESOLUTION RESULT
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PricingSource {
    Professional,
    Platform,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedPricing {
    pub therapy_type: TherapyType,
    pub price: i64,
    pub platform_fee: i64,
    pub professional_payout: i64,
    pub currency: String,
    pub source: PricingSource,
}

impl ResolvedPricing {
    /// Splits `price` into fee and payout. The fee is rounded once (half away
    /// from zero) and the payout is the remainder, so the parts always sum to
    /// the price.
    pub fn split(
        therapy_type: TherapyType,
        price: i64,
        fee_percentage: f64,
        currency: &str,
        source: PricingSource,
    ) -> Result<Self, PricingError> {
        if price <= 0 {
            return Err(PricingError::InvalidPrice { therapy_type, price });
        }
        if !(0.0..=100.0).contains(&fee_percentage) {
            return Err(PricingError::InvalidFeePercentage(fee_percentage));
        }

        let platform_fee = (price as f64 * fee_percentage / 100.0).round() as i64;
        let professional_payout = price - platform_fee;

        Ok(Self {
            therapy_type,
            price,
            platform_fee,
            professional_payout,
            currency: currency.to_string(),
            source,
        })
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid {therapy_type} price: {price}")]
    InvalidPrice { therapy_type: TherapyType, price: i64 },

    #[error("Invalid platform fee percentage: {0}")]
    InvalidFeePercentage(f64),

    #[error("Pricing store error: {0}")]
    StoreError(String),
}
