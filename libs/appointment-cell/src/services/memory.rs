// libs/appointment-cell/src/services/memory.rs
//! In-process `AppointmentStore`. Each conditional write holds the map lock
//! across its check and its update, matching the row-level atomicity of the
//! Supabase implementation.
use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, PaymentGuard, PaymentPatch,
    PaymentStatus,
};
use crate::services::store::AppointmentStore;

/// Injected failure for the next `mark_paid_out` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutMarkFault {
    /// The call fails outright.
    Error,
    /// Only the first N eligible appointments get stamped.
    Partial(usize),
}

#[derive(Default)]
pub struct MemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
    payout_faults: Mutex<VecDeque<PayoutMarkFault>>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, appointment: Appointment) {
        self.appointments.lock().await.insert(appointment.id, appointment);
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<Appointment> {
        self.appointments.lock().await.get(&id).cloned()
    }

    pub async fn push_payout_fault(&self, fault: PayoutMarkFault) {
        self.payout_faults.lock().await.push_back(fault);
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        if appointments.contains_key(&appointment.id) {
            return Err(AppointmentError::DatabaseError("duplicate key".to_string()));
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.lock().await.get(&id).cloned())
    }

    async fn query(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.lock().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.date, &a.time).cmp(&(b.date, &b.time)));
        Ok(found)
    }

    async fn assign_professional(
        &self,
        id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let Some(appointment) = appointments.get_mut(&id) else {
            return Ok(None);
        };
        if appointment.check_accept(professional_id).is_err() {
            return Ok(None);
        }
        appointment.apply_acceptance(professional_id, Utc::now());
        Ok(Some(appointment.clone()))
    }

    async fn record_refusal(
        &self,
        id: Uuid,
        professional_id: Uuid,
        reason: Option<String>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let Some(appointment) = appointments.get_mut(&id) else {
            return Ok(None);
        };
        if appointment.check_refuse(professional_id).is_err() {
            return Ok(None);
        }
        appointment.apply_refusal(professional_id, reason, Utc::now());
        Ok(Some(appointment.clone()))
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let Some(appointment) = appointments.get_mut(&id) else {
            return Ok(None);
        };
        if appointment.status != from {
            return Ok(None);
        }
        if to == AppointmentStatus::Scheduled && appointment.professional_id.is_none() {
            return Ok(None);
        }
        appointment.status = to;
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        guard: &PaymentGuard,
        patch: &PaymentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut appointments = self.appointments.lock().await;
        let Some(appointment) = appointments.get_mut(&id) else {
            return Ok(None);
        };
        if !guard.admits(&appointment.payment) {
            return Ok(None);
        }
        patch.apply(&mut appointment.payment);
        appointment.updated_at = Utc::now();
        Ok(Some(appointment.clone()))
    }

    async fn mark_paid_out(
        &self,
        ids: &[Uuid],
        transfer_id: &str,
        paid_out_at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, AppointmentError> {
        let fault = self.payout_faults.lock().await.pop_front();
        let limit = match fault {
            Some(PayoutMarkFault::Error) => {
                return Err(AppointmentError::DatabaseError("injected payout marking failure".to_string()));
            }
            Some(PayoutMarkFault::Partial(n)) => n,
            None => usize::MAX,
        };

        let mut appointments = self.appointments.lock().await;
        let mut marked = Vec::new();
        for id in ids {
            if marked.len() >= limit {
                break;
            }
            let Some(appointment) = appointments.get_mut(id) else {
                continue;
            };
            let payment = &mut appointment.payment;
            let eligible = payment.status == PaymentStatus::Paid
                && payment.payout_transfer_id.as_deref().map_or(true, |t| t == transfer_id);
            if eligible {
                payment.payout_transfer_id = Some(transfer_id.to_string());
                payment.payout_at.get_or_insert(paid_out_at);
                marked.push(*id);
            }
        }
        Ok(marked)
    }
}
