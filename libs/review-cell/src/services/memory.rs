// libs/review-cell/src/services/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Review, ReviewError};
use crate::services::store::ReviewStore;

/// Keyed by appointment, so the uniqueness check and insert share one lock.
#[derive(Default)]
pub struct MemoryReviewStore {
    reviews: Mutex<HashMap<Uuid, Review>>,
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.reviews.lock().await.len()
    }
}

#[async_trait]
impl ReviewStore for MemoryReviewStore {
    async fn insert(&self, review: &Review) -> Result<Review, ReviewError> {
        let mut reviews = self.reviews.lock().await;
        if reviews.contains_key(&review.appointment_id) {
            return Err(ReviewError::AlreadyReviewed);
        }
        reviews.insert(review.appointment_id, review.clone());
        Ok(review.clone())
    }

    async fn for_appointment(&self, appointment_id: Uuid) -> Result<Option<Review>, ReviewError> {
        Ok(self.reviews.lock().await.get(&appointment_id).cloned())
    }
}
