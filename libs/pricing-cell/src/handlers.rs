// libs/pricing-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{PricingError, TherapyType};
use crate::state::PricingState;

#[derive(Debug, Deserialize)]
pub struct PricingQuery {
    pub therapy_type: Option<TherapyType>,
}

impl From<PricingError> for AppError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::InvalidPrice { .. } | PricingError::InvalidFeePercentage(_) => {
                error!("Pricing configuration invalid: {}", e);
                AppError::Internal(e.to_string())
            }
            PricingError::StoreError(msg) => AppError::Database(msg),
        }
    }
}

pub async fn resolve_pricing(
    State(state): State<PricingState>,
    Extension(user): Extension<User>,
    Path(professional_id): Path<Uuid>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<Value>, AppError> {
    debug!("Pricing lookup by {} for professional {}", user.id, professional_id);

    let therapy_type = query.therapy_type.unwrap_or(TherapyType::Solo);
    let pricing = state.pricing.resolve_pricing(professional_id, therapy_type).await?;

    Ok(Json(json!({
        "professional_id": professional_id,
        "pricing": pricing,
    })))
}

pub async fn get_platform_settings(
    State(state): State<PricingState>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let settings = state.pricing.platform_settings().await?;
    Ok(Json(json!(settings)))
}
