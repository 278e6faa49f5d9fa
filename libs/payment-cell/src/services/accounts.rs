// libs/payment-cell/src/services/accounts.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::error::PaymentError;
use crate::models::{ChargeReconciliation, PayoutReconciliation, UserAccount};

/// Payment references on user profiles.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserAccount>, PaymentError>;

    async fn set_stripe_customer(&self, user_id: Uuid, customer_id: &str) -> Result<(), PaymentError>;

    async fn set_stripe_account(&self, user_id: Uuid, account_id: &str) -> Result<(), PaymentError>;
}

/// Money that moved at the processor without a matching local record.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    async fn record(&self, entry: &PayoutReconciliation) -> Result<(), PaymentError>;

    /// Unresolved payout flags for a professional, oldest first.
    async fn open_payouts(&self, professional_id: Uuid) -> Result<Vec<PayoutReconciliation>, PaymentError>;

    async fn resolve_payout(&self, id: Uuid, resolved_at: DateTime<Utc>) -> Result<(), PaymentError>;

    async fn record_charge(&self, entry: &ChargeReconciliation) -> Result<(), PaymentError>;
}

fn db_error(e: anyhow::Error) -> PaymentError {
    PaymentError::Database(e.to_string())
}

pub struct SupabaseAccountStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAccountStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn patch(&self, user_id: Uuid, body: serde_json::Value) -> Result<(), PaymentError> {
        let path = format!("/rest/v1/profiles?id=eq.{}", user_id);
        let rows: Vec<UserAccount> = self.supabase
            .write_returning(Method::PATCH, &path, None, body)
            .await
            .map_err(db_error)?;

        if rows.is_empty() {
            return Err(PaymentError::Database(format!("Profile {} not found", user_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for SupabaseAccountStore {
    async fn get(&self, user_id: Uuid) -> Result<Option<UserAccount>, PaymentError> {
        let path = format!(
            "/rest/v1/profiles?id=eq.{}&select=id,email,stripe_customer_id,stripe_account_id&limit=1",
            user_id
        );
        let rows: Vec<UserAccount> = self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(db_error)?;

        Ok(rows.into_iter().next())
    }

    async fn set_stripe_customer(&self, user_id: Uuid, customer_id: &str) -> Result<(), PaymentError> {
        debug!("Storing Stripe customer {} for user {}", customer_id, user_id);
        self.patch(user_id, json!({ "stripe_customer_id": customer_id })).await
    }

    async fn set_stripe_account(&self, user_id: Uuid, account_id: &str) -> Result<(), PaymentError> {
        debug!("Storing connected account {} for user {}", account_id, user_id);
        self.patch(user_id, json!({ "stripe_account_id": account_id })).await
    }
}

pub struct SupabaseReconciliationStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseReconciliationStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl ReconciliationStore for SupabaseReconciliationStore {
    async fn record(&self, entry: &PayoutReconciliation) -> Result<(), PaymentError> {
        let _: Vec<PayoutReconciliation> = self.supabase
            .write_returning(Method::POST, "/rest/v1/payout_reconciliations", None, json!(entry))
            .await
            .map_err(db_error)?;

        info!(
            "Recorded payout reconciliation {} for transfer {} ({} appointments)",
            entry.id, entry.transfer_id, entry.appointment_ids.len()
        );
        Ok(())
    }

    async fn open_payouts(&self, professional_id: Uuid) -> Result<Vec<PayoutReconciliation>, PaymentError> {
        let path = format!(
            "/rest/v1/payout_reconciliations?professional_id=eq.{}&resolved_at=is.null&order=created_at.asc",
            professional_id
        );
        self.supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(db_error)
    }

    async fn resolve_payout(&self, id: Uuid, resolved_at: DateTime<Utc>) -> Result<(), PaymentError> {
        let path = format!("/rest/v1/payout_reconciliations?id=eq.{}&resolved_at=is.null", id);
        let rows: Vec<PayoutReconciliation> = self.supabase
            .write_returning(Method::PATCH, &path, None, json!({ "resolved_at": resolved_at.to_rfc3339() }))
            .await
            .map_err(db_error)?;

        if rows.is_empty() {
            debug!("Payout reconciliation {} was already resolved", id);
        } else {
            info!("Resolved payout reconciliation {}", id);
        }
        Ok(())
    }

    async fn record_charge(&self, entry: &ChargeReconciliation) -> Result<(), PaymentError> {
        let _: Vec<ChargeReconciliation> = self.supabase
            .write_returning(Method::POST, "/rest/v1/charge_reconciliations", None, json!(entry))
            .await
            .map_err(db_error)?;

        warn!(
            "Recorded charge reconciliation {} for intent {} on appointment {}",
            entry.id, entry.payment_intent_id, entry.appointment_id
        );
        Ok(())
    }
}
