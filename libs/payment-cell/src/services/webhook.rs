// libs/payment-cell/src/services/webhook.rs
//! Stripe webhook signature verification and event parsing.
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::warn;
use uuid::Uuid;

use crate::error::PaymentError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

impl StripeEvent {
    pub fn object_id(&self) -> Option<&str> {
        self.data.object["id"].as_str()
    }

    pub fn appointment_id(&self) -> Option<Uuid> {
        self.data.object["metadata"]["appointment_id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against
/// the raw payload.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), PaymentError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature("missing v1 signature".to_string()));
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        warn!("Webhook timestamp {} outside tolerance (now {})", timestamp, now);
        return Err(PaymentError::InvalidSignature("timestamp outside tolerance".to_string()));
    }

    for candidate in signatures {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(PaymentError::InvalidSignature("no matching signature".to_string()))
}

pub fn parse_event(payload: &[u8]) -> Result<StripeEvent, PaymentError> {
    serde_json::from_slice(payload)
        .map_err(|e| PaymentError::Validation(format!("Malformed webhook event: {}", e)))
}

/// Builds a valid header for `payload`; used by tests and local tooling.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={}", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
