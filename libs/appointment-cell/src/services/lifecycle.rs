// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Client(Uuid),
    Professional(Uuid),
    Admin,
}

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Scheduled,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Ongoing,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Ongoing => vec![AppointmentStatus::Completed],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::NoShow => vec![],
        }
    }

    /// The assigned professional and admins drive the lifecycle; the owning
    /// client may only cancel.
    pub fn authorize(
        &self,
        appointment: &Appointment,
        actor: Actor,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        match actor {
            Actor::Admin => Ok(()),
            Actor::Professional(id) if appointment.professional_id == Some(id) => Ok(()),
            Actor::Client(id) if appointment.client_id == id => {
                if new_status == AppointmentStatus::Cancelled {
                    Ok(())
                } else {
                    Err(AppointmentError::Unauthorized(
                        "Clients may only cancel their appointments".to_string(),
                    ))
                }
            }
            _ => Err(AppointmentError::Unauthorized(
                "Not a participant in this appointment".to_string(),
            )),
        }
    }

    pub fn check_transition(
        &self,
        appointment: &Appointment,
        actor: Actor,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        self.authorize(appointment, actor, new_status)?;
        self.validate_status_transition(appointment.status, new_status)?;

        if new_status == AppointmentStatus::Scheduled && appointment.professional_id.is_none() {
            return Err(AppointmentError::ProfessionalRequired);
        }
        Ok(())
    }
}
