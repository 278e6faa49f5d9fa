// libs/review-cell/src/services/review.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentStatus, PaymentStatus};
use appointment_cell::AppointmentStore;

use crate::models::{Review, ReviewError, SubmitReviewRequest};
use crate::services::store::ReviewStore;

pub struct ReviewService {
    appointments: Arc<dyn AppointmentStore>,
    reviews: Arc<dyn ReviewStore>,
}

impl ReviewService {
    pub fn new(appointments: Arc<dyn AppointmentStore>, reviews: Arc<dyn ReviewStore>) -> Self {
        Self { appointments, reviews }
    }

    async fn owned_appointment(&self, appointment_id: Uuid, client_id: Uuid) -> Result<Appointment, ReviewError> {
        let appointment = self.appointments
            .get(appointment_id)
            .await
            .map_err(|e| ReviewError::DatabaseError(e.to_string()))?
            .ok_or(ReviewError::AppointmentNotFound)?;

        if appointment.client_id != client_id {
            return Err(ReviewError::NotAppointmentClient);
        }
        Ok(appointment)
    }

    pub async fn submit_review(&self, client_id: Uuid, request: SubmitReviewRequest) -> Result<Review, ReviewError> {
        request.validate()?;

        let appointment = self.owned_appointment(request.appointment_id, client_id).await?;
        if appointment.status != AppointmentStatus::Completed {
            return Err(ReviewError::NotCompleted);
        }
        if appointment.payment.status != PaymentStatus::Paid {
            return Err(ReviewError::NotPaid);
        }
        let professional_id = appointment.professional_id.ok_or(ReviewError::NoProfessional)?;

        let review = Review {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            client_id,
            professional_id,
            rating: request.rating,
            comment: request.comment,
            categories: request.categories,
            anonymous: request.anonymous,
            created_at: Utc::now(),
        };

        match self.reviews.insert(&review).await {
            Ok(created) => {
                info!("Review {} submitted for appointment {}", created.id, created.appointment_id);
                Ok(created)
            }
            Err(ReviewError::AlreadyReviewed) => {
                warn!("Duplicate review attempt for appointment {}", appointment.id);
                Err(ReviewError::AlreadyReviewed)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_review(&self, appointment_id: Uuid, client_id: Uuid) -> Result<Option<Review>, ReviewError> {
        self.owned_appointment(appointment_id, client_id).await?;
        self.reviews.for_appointment(appointment_id).await
    }
}
