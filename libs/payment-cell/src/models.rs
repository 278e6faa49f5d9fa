// libs/payment-cell/src/models.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::models::PaymentStatus;

// ==============================================================================
// PROCESSOR OBJECTS
// ==============================================================================
// Amounts on processor objects are minor units (cents); everything else in
// this crate is whole currency units.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectedAccount {
    pub id: String,
    #[serde(default)]
    pub details_submitted: bool,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountLink {
    pub url: String,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceAmount {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Balance {
    #[serde(default)]
    pub available: Vec<BalanceAmount>,
    #[serde(default)]
    pub pending: Vec<BalanceAmount>,
}

impl Balance {
    fn total(amounts: &[BalanceAmount], currency: &str) -> i64 {
        amounts
            .iter()
            .filter(|a| a.currency.eq_ignore_ascii_case(currency))
            .map(|a| a.amount)
            .sum()
    }

    pub fn available_in(&self, currency: &str) -> i64 {
        Self::total(&self.available, currency)
    }

    pub fn pending_in(&self, currency: &str) -> i64 {
        Self::total(&self.pending, currency)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transfer {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub destination: Option<String>,
}

// ==============================================================================
// GATEWAY PARAMETERS
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCustomerParams {
    pub email: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatePaymentIntentParams {
    pub amount: i64,
    pub currency: String,
    pub customer_id: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundParams {
    pub payment_intent_id: String,
    pub reason: Option<String>,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedAccountParams {
    pub email: Option<String>,
    pub professional_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountLinkParams {
    pub account_id: String,
    pub refresh_url: String,
    pub return_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferParams {
    pub amount: i64,
    pub currency: String,
    pub destination: String,
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

// ==============================================================================
// STORED RECORDS
// ==============================================================================

/// Payment references kept on the user's profile row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_account_id: Option<String>,
}

/// Written when a transfer went out but some appointments could not be
/// stamped with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutReconciliation {
    pub id: Uuid,
    pub transfer_id: String,
    pub professional_id: Uuid,
    pub appointment_ids: Vec<Uuid>,
    pub amount: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Written when the processor captured money that the appointment record
/// could not take as its payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeReconciliation {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub payment_intent_id: String,
    pub recorded_status: Option<PaymentStatus>,
    pub recorded_intent_id: Option<String>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub appointment_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundResponse {
    pub appointment_id: Uuid,
    pub refund_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub professional_id: Uuid,
    pub appointment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayoutResponse {
    pub transfer_id: String,
    pub professional_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub appointment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PayoutStatus {
    pub setup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details_submitted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charges_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payouts_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnboardingLink {
    pub account_id: String,
    pub url: String,
    pub expires_at: Option<i64>,
}

/// What a webhook delivery did to local state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Applied,
    AlreadyApplied,
    Flagged,
    Ignored,
}

pub fn minor_units(amount: i64) -> i64 {
    amount * 100
}

pub fn major_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}
