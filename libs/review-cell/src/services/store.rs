// libs/review-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use uuid::Uuid;

use shared_database::supabase::{SupabaseApiError, SupabaseClient};

use crate::models::{Review, ReviewError};

/// One review per appointment; `insert` reports a duplicate as
/// `AlreadyReviewed`.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn insert(&self, review: &Review) -> Result<Review, ReviewError>;

    async fn for_appointment(&self, appointment_id: Uuid) -> Result<Option<Review>, ReviewError>;
}

pub struct SupabaseReviewStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseReviewStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

fn db_error(e: anyhow::Error) -> ReviewError {
    match e.downcast_ref::<SupabaseApiError>() {
        Some(api) if api.is_conflict() => ReviewError::AlreadyReviewed,
        _ => ReviewError::DatabaseError(e.to_string()),
    }
}

#[async_trait]
impl ReviewStore for SupabaseReviewStore {
    async fn insert(&self, review: &Review) -> Result<Review, ReviewError> {
        let rows: Vec<Review> = self.supabase
            .write_returning(Method::POST, "/rest/v1/reviews", None, json!(review))
            .await
            .map_err(db_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| ReviewError::DatabaseError("Insert returned no row".to_string()))
    }

    async fn for_appointment(&self, appointment_id: Uuid) -> Result<Option<Review>, ReviewError> {
        let path = format!("/rest/v1/reviews?appointment_id=eq.{}&limit=1", appointment_id);
        let rows: Vec<Review> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }
}
