// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use pricing_cell::TherapyType;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub professional_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: String,
    pub duration: i32,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub therapy_type: TherapyType,
    pub issue_type: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub routing_status: RoutingStatus,
    #[serde(default)]
    pub proposed_to: Vec<Uuid>,
    #[serde(default)]
    pub refused_by: Vec<Uuid>,
    #[serde(default)]
    pub refusals: Vec<RefusalRecord>,
    #[serde(default)]
    pub payment: Payment,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Ongoing => write!(f, "ongoing"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    Video,
    InPerson,
    Phone,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Video => write!(f, "video"),
            AppointmentType::InPerson => write!(f, "in-person"),
            AppointmentType::Phone => write!(f, "phone"),
        }
    }
}

/// Where an unassigned appointment sits in the routing flow. `Refused` is a
/// cosmetic tag for "every proposed professional declined" and behaves like
/// `General` everywhere.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RoutingStatus {
    Proposed,
    General,
    Accepted,
    Refused,
}

impl fmt::Display for RoutingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingStatus::Proposed => write!(f, "proposed"),
            RoutingStatus::General => write!(f, "general"),
            RoutingStatus::Accepted => write!(f, "accepted"),
            RoutingStatus::Refused => write!(f, "refused"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefusalRecord {
    pub professional_id: Uuid,
    pub reason: Option<String>,
    pub refused_at: DateTime<Utc>,
}

// ==============================================================================
// PAYMENT SUB-RECORD
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_pre_paid(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Processing => write!(f, "processing"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub price: i64,
    pub platform_fee: i64,
    pub professional_payout: i64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub refund_id: Option<String>,
    #[serde(default)]
    pub payout_transfer_id: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refunded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payout_at: Option<DateTime<Utc>>,
}

impl Default for Payment {
    fn default() -> Self {
        Self {
            price: 0,
            platform_fee: 0,
            professional_payout: 0,
            currency: "CAD".to_string(),
            status: PaymentStatus::Pending,
            payment_intent_id: None,
            refund_id: None,
            payout_transfer_id: None,
            paid_at: None,
            refunded_at: None,
            payout_at: None,
        }
    }
}

/// Precondition for a payment write: the current status must be one of
/// `statuses`, and when `payment_intent_id` is set it must match the stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentGuard {
    pub statuses: Vec<PaymentStatus>,
    pub payment_intent_id: Option<String>,
}

impl PaymentGuard {
    pub fn from_statuses(statuses: &[PaymentStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            payment_intent_id: None,
        }
    }

    pub fn with_intent(mut self, payment_intent_id: &str) -> Self {
        self.payment_intent_id = Some(payment_intent_id.to_string());
        self
    }

    pub fn admits(&self, payment: &Payment) -> bool {
        self.statuses.contains(&payment.status)
            && self
                .payment_intent_id
                .as_ref()
                .map_or(true, |expected| payment.payment_intent_id.as_ref() == Some(expected))
    }
}

/// Fields merged into the payment sub-record by a guarded transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPatch {
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_fee: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional_payout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
}

impl PaymentPatch {
    pub fn status(status: PaymentStatus) -> Self {
        Self {
            status,
            price: None,
            platform_fee: None,
            professional_payout: None,
            currency: None,
            payment_intent_id: None,
            refund_id: None,
            paid_at: None,
            refunded_at: None,
        }
    }

    pub fn apply(&self, payment: &mut Payment) {
        payment.status = self.status;
        if let Some(price) = self.price { payment.price = price; }
        if let Some(fee) = self.platform_fee { payment.platform_fee = fee; }
        if let Some(payout) = self.professional_payout { payment.professional_payout = payout; }
        if let Some(ref currency) = self.currency { payment.currency = currency.clone(); }
        if let Some(ref intent) = self.payment_intent_id { payment.payment_intent_id = Some(intent.clone()); }
        if let Some(ref refund) = self.refund_id { payment.refund_id = Some(refund.clone()); }
        if let Some(at) = self.paid_at { payment.paid_at = Some(at); }
        if let Some(at) = self.refunded_at { payment.refunded_at = Some(at); }
    }
}

// ==============================================================================
// ROUTING RULES
// ==============================================================================

impl Appointment {
    pub fn is_unassigned_pending(&self) -> bool {
        self.status == AppointmentStatus::Pending && self.professional_id.is_none()
    }

    pub fn is_open_pool(&self) -> bool {
        matches!(self.routing_status, RoutingStatus::General | RoutingStatus::Refused)
    }

    pub fn all_proposed_refused(&self) -> bool {
        !self.proposed_to.is_empty()
            && self.proposed_to.iter().all(|p| self.refused_by.contains(p))
    }

    fn assignable(&self) -> Result<(), AppointmentError> {
        if self.professional_id.is_some() {
            return Err(AppointmentError::AlreadyAssigned);
        }
        if self.status != AppointmentStatus::Pending {
            return Err(AppointmentError::NotPending(self.status));
        }
        Ok(())
    }

    /// Whether `professional_id` may accept right now; the error says why not.
    pub fn check_accept(&self, professional_id: Uuid) -> Result<(), AppointmentError> {
        self.assignable()?;
        if self.refused_by.contains(&professional_id) {
            return Err(AppointmentError::PreviouslyRefused);
        }
        if self.proposed_to.contains(&professional_id) || self.is_open_pool() {
            return Ok(());
        }
        Err(AppointmentError::NotEligible)
    }

    pub fn apply_acceptance(&mut self, professional_id: Uuid, now: DateTime<Utc>) {
        self.professional_id = Some(professional_id);
        self.routing_status = RoutingStatus::Accepted;
        self.updated_at = now;
    }

    pub fn check_refuse(&self, professional_id: Uuid) -> Result<(), AppointmentError> {
        self.assignable()?;
        if !self.proposed_to.contains(&professional_id) {
            return Err(AppointmentError::NotProposed);
        }
        if self.refused_by.contains(&professional_id) {
            return Err(AppointmentError::AlreadyRefused);
        }
        Ok(())
    }

    /// Appends the refusal and promotes to the open pool once every proposed
    /// professional has declined. Returns true when this call promoted it.
    pub fn apply_refusal(&mut self, professional_id: Uuid, reason: Option<String>, now: DateTime<Utc>) -> bool {
        self.refused_by.push(professional_id);
        self.refusals.push(RefusalRecord {
            professional_id,
            reason,
            refused_at: now,
        });
        self.updated_at = now;

        if self.routing_status == RoutingStatus::Proposed && self.all_proposed_refused() {
            self.routing_status = RoutingStatus::General;
            return true;
        }
        false
    }
}

// ==============================================================================
// TYPED QUERIES
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeneralPoolFilters {
    pub issue_type: Option<String>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub therapy_type: Option<TherapyType>,
}

/// One variant per listing operation of the routing and payout flows.
#[derive(Debug, Clone, PartialEq)]
pub enum AppointmentQuery {
    GeneralPool {
        professional_id: Uuid,
        filters: GeneralPoolFilters,
    },
    ProposedTo {
        professional_id: Uuid,
    },
    PayoutCandidates {
        professional_id: Uuid,
        appointment_ids: Vec<Uuid>,
    },
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        match self {
            AppointmentQuery::GeneralPool { professional_id, filters } => {
                appointment.is_open_pool()
                    && appointment.is_unassigned_pending()
                    && !appointment.refused_by.contains(professional_id)
                    && filters.issue_type.as_ref().map_or(true, |i| appointment.issue_type.as_ref() == Some(i))
                    && filters.appointment_type.map_or(true, |t| appointment.appointment_type == t)
                    && filters.therapy_type.map_or(true, |t| appointment.therapy_type == t)
            }
            AppointmentQuery::ProposedTo { professional_id } => {
                appointment.routing_status == RoutingStatus::Proposed
                    && appointment.status == AppointmentStatus::Pending
                    && appointment.proposed_to.contains(professional_id)
            }
            AppointmentQuery::PayoutCandidates { professional_id, appointment_ids } => {
                appointment_ids.contains(&appointment.id)
                    && appointment.professional_id == Some(*professional_id)
                    && appointment.payment.status == PaymentStatus::Paid
                    && appointment.payment.payout_transfer_id.is_none()
            }
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub duration: i32,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub therapy_type: TherapyType,
    pub issue_type: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub proposed_to: Vec<Uuid>,
}

impl BookAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.duration <= 0 {
            return Err(AppointmentError::ValidationError("Duration must be positive".to_string()));
        }
        if NaiveTime::parse_from_str(&self.time, "%H:%M").is_err() {
            return Err(AppointmentError::ValidationError(format!(
                "Invalid time '{}', expected HH:MM",
                self.time
            )));
        }
        Ok(())
    }

    pub fn into_appointment(self, now: DateTime<Utc>) -> Appointment {
        let mut proposed_to = self.proposed_to;
        proposed_to.sort();
        proposed_to.dedup();

        let routing_status = if proposed_to.is_empty() {
            RoutingStatus::General
        } else {
            RoutingStatus::Proposed
        };

        Appointment {
            id: Uuid::new_v4(),
            client_id: self.client_id,
            professional_id: None,
            date: self.date,
            time: self.time,
            duration: self.duration,
            appointment_type: self.appointment_type,
            therapy_type: self.therapy_type,
            issue_type: self.issue_type,
            notes: self.notes,
            status: AppointmentStatus::Pending,
            routing_status,
            proposed_to,
            refused_by: Vec::new(),
            refusals: Vec::new(),
            payment: Payment::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefuseAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefusalOutcome {
    pub appointment: Appointment,
    pub cascaded: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment already assigned to a professional")]
    AlreadyAssigned,

    #[error("Appointment is no longer pending (status: {0})")]
    NotPending(AppointmentStatus),

    #[error("Professional is not eligible to accept this appointment")]
    NotEligible,

    #[error("Professional already declined this appointment")]
    PreviouslyRefused,

    #[error("Appointment was not proposed to this professional")]
    NotProposed,

    #[error("Appointment already refused by this professional")]
    AlreadyRefused,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Appointment has no assigned professional")]
    ProfessionalRequired,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(proposed_to: Vec<Uuid>) -> Appointment {
        BookAppointmentRequest {
            client_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: "14:00".to_string(),
            duration: 50,
            appointment_type: AppointmentType::Video,
            therapy_type: TherapyType::Solo,
            issue_type: Some("anxiety".to_string()),
            notes: None,
            proposed_to,
        }
        .into_appointment(Utc::now())
    }

    #[test]
    fn test_routing_status_from_proposals() {
        assert_eq!(pending(vec![]).routing_status, RoutingStatus::General);
        assert_eq!(pending(vec![Uuid::new_v4()]).routing_status, RoutingStatus::Proposed);
    }

    #[test]
    fn test_serde_wire_names() {
        let mut appointment = pending(vec![]);
        appointment.status = AppointmentStatus::NoShow;
        appointment.appointment_type = AppointmentType::InPerson;
        let value = serde_json::to_value(&appointment).unwrap();
        assert_eq!(value["status"], "no-show");
        assert_eq!(value["type"], "in-person");
        assert_eq!(value["therapy_type"], "solo");
        assert_eq!(value["payment"]["status"], "pending");
    }

    #[test]
    fn test_accept_rules() {
        let p1 = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let mut appointment = pending(vec![p1]);

        assert!(appointment.check_accept(p1).is_ok());
        assert!(matches!(appointment.check_accept(outsider), Err(AppointmentError::NotEligible)));

        appointment.apply_acceptance(p1, Utc::now());
        assert_eq!(appointment.routing_status, RoutingStatus::Accepted);
        assert!(matches!(appointment.check_accept(p1), Err(AppointmentError::AlreadyAssigned)));
    }

    #[test]
    fn test_refusal_cascade_only_after_last_refusal() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut appointment = pending(vec![p1, p2]);

        assert!(!appointment.apply_refusal(p1, None, Utc::now()));
        assert_eq!(appointment.routing_status, RoutingStatus::Proposed);
        assert!(appointment.apply_refusal(p2, Some("full schedule".into()), Utc::now()));
        assert_eq!(appointment.routing_status, RoutingStatus::General);
        assert_eq!(appointment.refusals.len(), 2);
    }

    #[test]
    fn test_refuse_guards() {
        let p1 = Uuid::new_v4();
        let mut appointment = pending(vec![p1]);
        assert!(matches!(appointment.check_refuse(Uuid::new_v4()), Err(AppointmentError::NotProposed)));
        appointment.apply_refusal(p1, None, Utc::now());
        assert!(matches!(appointment.check_refuse(p1), Err(AppointmentError::AlreadyRefused)));
        assert!(matches!(appointment.check_accept(p1), Err(AppointmentError::PreviouslyRefused)));
    }

    #[test]
    fn test_general_pool_hides_refusers() {
        let (p1, p3) = (Uuid::new_v4(), Uuid::new_v4());
        let mut appointment = pending(vec![p1]);
        appointment.apply_refusal(p1, None, Utc::now());

        let for_p1 = AppointmentQuery::GeneralPool { professional_id: p1, filters: GeneralPoolFilters::default() };
        let for_p3 = AppointmentQuery::GeneralPool { professional_id: p3, filters: GeneralPoolFilters::default() };
        assert!(!for_p1.matches(&appointment));
        assert!(for_p3.matches(&appointment));

        let filtered = AppointmentQuery::GeneralPool {
            professional_id: p3,
            filters: GeneralPoolFilters { therapy_type: Some(TherapyType::Couple), ..Default::default() },
        };
        assert!(!filtered.matches(&appointment));
    }

    #[test]
    fn test_payment_guard_intent_match() {
        let mut payment = Payment::default();
        payment.status = PaymentStatus::Processing;
        payment.payment_intent_id = Some("pi_1".to_string());

        let guard = PaymentGuard::from_statuses(&[PaymentStatus::Processing]);
        assert!(guard.admits(&payment));
        assert!(guard.clone().with_intent("pi_1").admits(&payment));
        assert!(!guard.with_intent("pi_2").admits(&payment));
    }

    #[test]
    fn test_booking_validation() {
        let mut request = BookAppointmentRequest {
            client_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: "25:99".to_string(),
            duration: 50,
            appointment_type: AppointmentType::Phone,
            therapy_type: TherapyType::Group,
            issue_type: None,
            notes: None,
            proposed_to: vec![],
        };
        assert!(request.validate().is_err());
        request.time = "09:30".to_string();
        assert!(request.validate().is_ok());
        request.duration = 0;
        assert!(request.validate().is_err());
    }
}
