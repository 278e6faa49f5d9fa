// libs/payment-cell/src/error.rs
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use appointment_cell::AppointmentError;
use pricing_cell::PricingError;
use shared_models::error::AppError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    SetupRequired(String),

    #[error("Payment processor rejected the request: {message}")]
    Rejected { message: String, details: Option<Value> },

    #[error("Payment processor unavailable: {0}")]
    Provider(String),

    #[error("{message}")]
    Reconciliation { message: String, details: Value },

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Payments are not configured")]
    NotConfigured,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PaymentError::Provider(format!("request timed out: {}", e))
        } else {
            PaymentError::Provider(e.to_string())
        }
    }
}

impl From<AppointmentError> for PaymentError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => PaymentError::NotFound,
            AppointmentError::DatabaseError(msg) => PaymentError::Database(msg),
            other => PaymentError::Conflict(other.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(e: PaymentError) -> Self {
        match e {
            PaymentError::NotFound => AppError::NotFound(e.to_string()),
            PaymentError::Forbidden(msg) => AppError::Forbidden(msg),
            PaymentError::Conflict(msg) => AppError::Conflict(msg),
            PaymentError::Validation(msg) => AppError::ValidationError(msg),
            PaymentError::SetupRequired(msg) => AppError::SetupRequired(msg),
            PaymentError::Rejected { message, details } => AppError::PaymentRejected { message, details },
            PaymentError::Provider(msg) => AppError::PaymentProvider(msg),
            PaymentError::Reconciliation { message, details } => {
                error!("Reconciliation required: {} ({})", message, details);
                AppError::ReconciliationRequired { message, details }
            }
            PaymentError::InvalidSignature(msg) => AppError::BadRequest(format!("Invalid webhook signature: {}", msg)),
            PaymentError::NotConfigured => AppError::Internal(e.to_string()),
            PaymentError::Database(msg) => AppError::Database(msg),
            PaymentError::Pricing(inner) => AppError::from(inner),
        }
    }
}
