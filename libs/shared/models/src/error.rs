use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Setup required: {0}")]
    SetupRequired(String),

    #[error("Payment rejected: {message}")]
    PaymentRejected { message: String, details: Option<Value> },

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Reconciliation required: {message}")]
    ReconciliationRequired { message: String, details: Value },

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    /// Stable machine-readable kind, returned as `code` in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal_error",
            AppError::Database(_) => "database_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::SetupRequired(_) => "setup_required",
            AppError::PaymentRejected { .. } => "payment_rejected",
            AppError::PaymentProvider(_) => "payment_provider_error",
            AppError::ReconciliationRequired { .. } => "reconciliation_required",
            AppError::ExternalService(_) => "external_service_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::SetupRequired(_) => StatusCode::BAD_REQUEST,
            AppError::PaymentRejected { .. } => StatusCode::BAD_REQUEST,
            AppError::PaymentProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ReconciliationRequired { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, details) = match self {
            AppError::PaymentRejected { message, details } => (message, details),
            AppError::ReconciliationRequired { message, details } => (message, Some(details)),
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg)
            | AppError::Database(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::SetupRequired(msg)
            | AppError::PaymentProvider(msg)
            | AppError::ExternalService(msg) => (msg, None),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::warn!("Error: {}: {}", status, message);
        }

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}
