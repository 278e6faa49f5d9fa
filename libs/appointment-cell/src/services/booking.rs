// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, PaymentGuard,
    PaymentPatch, PaymentStatus,
};
use crate::services::lifecycle::{Actor, AppointmentLifecycleService};
use crate::services::store::AppointmentStore;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        request.validate()?;

        let appointment = request.into_appointment(Utc::now());
        debug!(
            "Booking {} appointment for client {} ({} proposals)",
            appointment.therapy_type, appointment.client_id, appointment.proposed_to.len()
        );

        let created = self.store.insert(&appointment).await?;
        info!("Appointment {} booked with routing status {}", created.id, created.routing_status);
        Ok(created)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(appointment_id).await?.ok_or(AppointmentError::NotFound)
    }

    /// Applies a lifecycle transition as a write conditioned on the status
    /// the caller saw.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id).await?;
        self.lifecycle.check_transition(&current, actor, new_status)?;

        let updated = self.store
            .transition_status(appointment_id, current.status, new_status)
            .await?
            .ok_or_else(|| {
                warn!("Appointment {} changed status concurrently", appointment_id);
                AppointmentError::InvalidStatusTransition { from: current.status, to: new_status }
            })?;

        info!("Appointment {} status {} -> {}", appointment_id, current.status, new_status);

        if new_status == AppointmentStatus::Cancelled {
            return Ok(self.cancel_open_payment(updated).await);
        }
        Ok(updated)
    }

    async fn cancel_open_payment(&self, appointment: Appointment) -> Appointment {
        if !appointment.payment.status.is_pre_paid() {
            return appointment;
        }

        let guard = PaymentGuard::from_statuses(&[PaymentStatus::Pending, PaymentStatus::Processing]);
        match self.store
            .transition_payment(appointment.id, &guard, &PaymentPatch::status(PaymentStatus::Cancelled))
            .await
        {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                warn!("Payment for cancelled appointment {} moved on before it could be cancelled", appointment.id);
                appointment
            }
            Err(e) => {
                warn!("Failed to cancel payment for appointment {}: {}", appointment.id, e);
                appointment
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use crate::models::{AppointmentType, TherapyType};
    use crate::services::memory::MemoryAppointmentStore;

    fn request(client_id: Uuid) -> BookAppointmentRequest {
        BookAppointmentRequest {
            client_id,
            date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            time: "10:30".to_string(),
            duration: 50,
            appointment_type: AppointmentType::Video,
            therapy_type: TherapyType::Couple,
            issue_type: Some("relationship".to_string()),
            notes: Some("first session".to_string()),
            proposed_to: vec![],
        }
    }

    #[tokio::test]
    async fn test_book_and_cancel_cancels_payment() {
        let store = Arc::new(MemoryAppointmentStore::new());
        let service = AppointmentBookingService::new(store.clone());
        let client_id = Uuid::new_v4();

        let booked = service.book_appointment(request(client_id)).await.unwrap();
        assert_eq!(booked.status, AppointmentStatus::Pending);

        let cancelled = service
            .update_status(booked.id, Actor::Client(client_id), AppointmentStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.payment.status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_full_lifecycle_by_professional() {
        let store = Arc::new(MemoryAppointmentStore::new());
        let service = AppointmentBookingService::new(store.clone());
        let booked = service.book_appointment(request(Uuid::new_v4())).await.unwrap();

        let pid = Uuid::new_v4();
        let mut assigned = store.snapshot(booked.id).await.unwrap();
        assigned.apply_acceptance(pid, Utc::now());
        store.put(assigned).await;

        let actor = Actor::Professional(pid);
        for status in [AppointmentStatus::Scheduled, AppointmentStatus::Ongoing, AppointmentStatus::Completed] {
            let updated = service.update_status(booked.id, actor, status).await.unwrap();
            assert_eq!(updated.status, status);
        }

        assert_matches!(
            service.update_status(booked.id, actor, AppointmentStatus::Cancelled).await,
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
    }

    #[tokio::test]
    async fn test_rejects_invalid_booking() {
        let service = AppointmentBookingService::new(Arc::new(MemoryAppointmentStore::new()));
        let mut bad = request(Uuid::new_v4());
        bad.duration = -5;
        assert_matches!(service.book_appointment(bad).await, Err(AppointmentError::ValidationError(_)));
    }
}
