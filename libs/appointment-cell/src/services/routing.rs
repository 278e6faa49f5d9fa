// libs/appointment-cell/src/services/routing.rs
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, GeneralPoolFilters, RefusalOutcome,
};
use crate::services::store::AppointmentStore;

/// Moves unassigned appointments between professionals: direct proposals,
/// the open pool, acceptance and refusal.
pub struct RoutingService {
    store: Arc<dyn AppointmentStore>,
}

impl RoutingService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Exactly one concurrent caller wins; the rest get `AlreadyAssigned`.
    pub async fn accept(
        &self,
        appointment_id: Uuid,
        professional_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Professional {} accepting appointment {}", professional_id, appointment_id);

        if let Some(appointment) = self.store.assign_professional(appointment_id, professional_id).await? {
            info!("Appointment {} accepted by professional {}", appointment_id, professional_id);
            return Ok(appointment);
        }

        let error = self.diagnose(appointment_id, |a| a.check_accept(professional_id)).await;
        warn!("Accept of {} by {} rejected: {}", appointment_id, professional_id, error);
        Err(error)
    }

    pub async fn refuse(
        &self,
        appointment_id: Uuid,
        professional_id: Uuid,
        reason: Option<String>,
    ) -> Result<RefusalOutcome, AppointmentError> {
        debug!("Professional {} refusing appointment {}", professional_id, appointment_id);

        let Some(appointment) = self.store
            .record_refusal(appointment_id, professional_id, reason)
            .await?
        else {
            let error = self.diagnose(appointment_id, |a| a.check_refuse(professional_id)).await;
            warn!("Refusal of {} by {} rejected: {}", appointment_id, professional_id, error);
            return Err(error);
        };

        // The store promotes on the last refusal; a promoted record has every
        // proposal refused and sits in the open pool.
        let cascaded = appointment.is_open_pool() && appointment.all_proposed_refused();
        if cascaded {
            info!("All proposed professionals declined {}, moved to general pool", appointment_id);
        } else {
            info!("Appointment {} refused by professional {}", appointment_id, professional_id);
        }

        Ok(RefusalOutcome { appointment, cascaded })
    }

    pub async fn general_pool(
        &self,
        professional_id: Uuid,
        filters: GeneralPoolFilters,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .query(&AppointmentQuery::GeneralPool { professional_id, filters })
            .await
    }

    pub async fn proposed_to(&self, professional_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        self.store
            .query(&AppointmentQuery::ProposedTo { professional_id })
            .await
    }

    /// Explains a conditional write that matched nothing by re-reading the
    /// record and running the same rule against it.
    async fn diagnose<F>(&self, appointment_id: Uuid, rule: F) -> AppointmentError
    where
        F: Fn(&Appointment) -> Result<(), AppointmentError>,
    {
        match self.store.get(appointment_id).await {
            Ok(Some(current)) => match rule(&current) {
                Err(e) => e,
                // The record changed back between the write and the read.
                Ok(()) => AppointmentError::AlreadyAssigned,
            },
            Ok(None) => AppointmentError::NotFound,
            Err(e) => e,
        }
    }
}
