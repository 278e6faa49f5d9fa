// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, PaymentGuard, PaymentPatch,
};

/// Persistence for appointment records. Every mutating method is a single
/// conditional write: it returns `None` (or an empty list) when the record
/// no longer satisfies the precondition, never a partially applied change.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    async fn query(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError>;

    /// Assigns the professional if the appointment is still unassigned,
    /// pending, not refused by them, and either proposed to them or open.
    async fn assign_professional(
        &self,
        id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Appends a refusal and promotes to the open pool when the last
    /// proposed professional declines.
    async fn record_refusal(
        &self,
        id: Uuid,
        professional_id: Uuid,
        reason: Option<String>,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn transition_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError>;

    async fn transition_payment(
        &self,
        id: Uuid,
        guard: &PaymentGuard,
        patch: &PaymentPatch,
    ) -> Result<Option<Appointment>, AppointmentError>;

    /// Stamps the transfer on every listed appointment that is paid and not
    /// yet paid out (or already carries this transfer). Returns the ids stamped.
    async fn mark_paid_out(
        &self,
        ids: &[Uuid],
        transfer_id: &str,
        paid_out_at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, AppointmentError>;
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

fn db_error(e: anyhow::Error) -> AppointmentError {
    AppointmentError::DatabaseError(e.to_string())
}

/// PostgREST filter string for a typed query.
pub fn postgrest_filter(query: &AppointmentQuery) -> String {
    match query {
        AppointmentQuery::GeneralPool { professional_id, filters } => {
            let mut parts = vec![
                "routing_status=in.(general,refused)".to_string(),
                "status=eq.pending".to_string(),
                "professional_id=is.null".to_string(),
                format!("refused_by=not.cs.{{{}}}", professional_id),
            ];
            if let Some(ref issue_type) = filters.issue_type {
                parts.push(format!("issue_type=eq.{}", urlencoding::encode(issue_type)));
            }
            if let Some(appointment_type) = filters.appointment_type {
                parts.push(format!("type=eq.{}", appointment_type));
            }
            if let Some(therapy_type) = filters.therapy_type {
                parts.push(format!("therapy_type=eq.{}", therapy_type));
            }
            parts.join("&")
        }
        AppointmentQuery::ProposedTo { professional_id } => format!(
            "proposed_to=cs.{{{}}}&routing_status=eq.proposed&status=eq.pending",
            professional_id
        ),
        AppointmentQuery::PayoutCandidates { professional_id, appointment_ids } => {
            let ids: Vec<String> = appointment_ids.iter().map(|id| id.to_string()).collect();
            format!(
                "id=in.({})&professional_id=eq.{}&payment->>status=eq.paid&payment->>payout_transfer_id=is.null",
                ids.join(","),
                professional_id
            )
        }
    }
}

#[derive(Deserialize)]
struct MarkedRow {
    id: Uuid,
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<Appointment, AppointmentError> {
        let rows: Vec<Appointment> = self.supabase
            .write_returning(Method::POST, "/rest/v1/appointments", None, json!(appointment))
            .await
            .map_err(db_error)?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Insert returned no row".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", id);
        let rows: Vec<Appointment> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    async fn query(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?{}&order=date.asc,time.asc",
            postgrest_filter(query)
        );
        debug!("Appointment query: {}", path);

        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(db_error)
    }

    async fn assign_professional(
        &self,
        id: Uuid,
        professional_id: Uuid,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{id}&professional_id=is.null&status=eq.pending\
             &refused_by=not.cs.{{{pid}}}&or=(proposed_to.cs.{{{pid}}},routing_status.in.(general,refused))",
            id = id,
            pid = professional_id,
        );
        let body = json!({
            "professional_id": professional_id,
            "routing_status": "accepted",
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self.supabase
            .write_returning(Method::PATCH, &path, None, body)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    async fn record_refusal(
        &self,
        id: Uuid,
        professional_id: Uuid,
        reason: Option<String>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self.supabase
            .rpc(
                "refuse_appointment",
                None,
                json!({
                    "p_appointment_id": id,
                    "p_professional_id": professional_id,
                    "p_reason": reason,
                }),
            )
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let mut path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, from);
        if to == AppointmentStatus::Scheduled {
            path.push_str("&professional_id=not.is.null");
        }
        let body = json!({
            "status": to,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self.supabase
            .write_returning(Method::PATCH, &path, None, body)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        guard: &PaymentGuard,
        patch: &PaymentPatch,
    ) -> Result<Option<Appointment>, AppointmentError> {
        let rows: Vec<Appointment> = self.supabase
            .rpc(
                "transition_payment",
                None,
                json!({
                    "p_appointment_id": id,
                    "p_from": guard.statuses,
                    "p_intent_id": guard.payment_intent_id,
                    "p_patch": patch,
                }),
            )
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    async fn mark_paid_out(
        &self,
        ids: &[Uuid],
        transfer_id: &str,
        paid_out_at: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, AppointmentError> {
        let rows: Vec<MarkedRow> = self.supabase
            .rpc(
                "mark_appointments_paid_out",
                None,
                json!({
                    "p_ids": ids,
                    "p_transfer_id": transfer_id,
                    "p_paid_out_at": paid_out_at.to_rfc3339(),
                }),
            )
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentType, GeneralPoolFilters, TherapyType};

    #[test]
    fn test_general_pool_filter() {
        let pid = Uuid::nil();
        let filter = postgrest_filter(&AppointmentQuery::GeneralPool {
            professional_id: pid,
            filters: GeneralPoolFilters {
                issue_type: Some("grief and loss".to_string()),
                appointment_type: Some(AppointmentType::InPerson),
                therapy_type: Some(TherapyType::Couple),
            },
        });

        assert!(filter.contains("routing_status=in.(general,refused)"));
        assert!(filter.contains(&format!("refused_by=not.cs.{{{}}}", pid)));
        assert!(filter.contains("issue_type=eq.grief%20and%20loss"));
        assert!(filter.contains("type=eq.in-person"));
        assert!(filter.contains("therapy_type=eq.couple"));
    }

    #[test]
    fn test_proposed_filter() {
        let pid = Uuid::nil();
        assert_eq!(
            postgrest_filter(&AppointmentQuery::ProposedTo { professional_id: pid }),
            format!("proposed_to=cs.{{{}}}&routing_status=eq.proposed&status=eq.pending", pid)
        );
    }
}
