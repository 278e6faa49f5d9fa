// libs/payment-cell/src/services/payment.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentQuery, AppointmentStatus, PaymentGuard, PaymentPatch, PaymentStatus,
};
use appointment_cell::{Actor, AppointmentStore};
use pricing_cell::PricingService;

use crate::error::PaymentError;
use crate::models::{
    major_units, minor_units, AccountLinkParams, ChargeReconciliation, ConnectedAccountParams,
    CreateCustomerParams, CreatePaymentIntentParams, IntentResponse, OnboardingLink, PayoutReconciliation,
    PayoutResponse, PayoutStatus, RefundParams, RefundResponse, TransferParams, WebhookOutcome,
};
use crate::services::accounts::{AccountStore, ReconciliationStore};
use crate::services::gateway::PaymentGateway;
use crate::services::notification::{PaymentNotification, PaymentNotifier};
use crate::services::webhook::StripeEvent;

pub const PAYOUT_MARK_ATTEMPTS: usize = 3;

/// Where the processor sends professionals during Connect onboarding.
#[derive(Debug, Clone)]
pub struct ConnectUrls {
    pub refresh_url: String,
    pub return_url: String,
}

pub struct PaymentDependencies {
    pub appointments: Arc<dyn AppointmentStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub reconciliations: Arc<dyn ReconciliationStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub pricing: Arc<PricingService>,
    pub notifier: Arc<PaymentNotifier>,
    pub connect: ConnectUrls,
}

pub struct PaymentService {
    appointments: Arc<dyn AppointmentStore>,
    accounts: Arc<dyn AccountStore>,
    reconciliations: Arc<dyn ReconciliationStore>,
    gateway: Arc<dyn PaymentGateway>,
    pricing: Arc<PricingService>,
    notifier: Arc<PaymentNotifier>,
    connect: ConnectUrls,
}

fn refund_conflict(status: PaymentStatus) -> PaymentError {
    PaymentError::Conflict(format!("Cannot refund appointment with payment status: {}", status))
}

/// Same professional and appointment set, same key, whatever the order.
pub fn payout_idempotency_key(professional_id: Uuid, appointment_ids: &[Uuid]) -> String {
    let mut ids: Vec<String> = appointment_ids.iter().map(|id| id.to_string()).collect();
    ids.sort();

    let mut hasher = Sha256::new();
    hasher.update(professional_id.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(ids.join(",").as_bytes());
    format!("payout-{}", hex::encode(hasher.finalize()))
}

impl PaymentService {
    pub fn new(deps: PaymentDependencies) -> Self {
        Self {
            appointments: deps.appointments,
            accounts: deps.accounts,
            reconciliations: deps.reconciliations,
            gateway: deps.gateway,
            pricing: deps.pricing,
            notifier: deps.notifier,
            connect: deps.connect,
        }
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, PaymentError> {
        self.appointments
            .get(appointment_id)
            .await?
            .ok_or(PaymentError::NotFound)
    }

    // ==========================================================================
    // PAYMENT INTENTS
    // ==========================================================================

    pub async fn create_intent(
        &self,
        appointment_id: Uuid,
        client_id: Uuid,
        client_email: Option<String>,
    ) -> Result<IntentResponse, PaymentError> {
        let appointment = self.load(appointment_id).await?;

        if appointment.client_id != client_id {
            return Err(PaymentError::Forbidden("Only the booking client can pay for this appointment".to_string()));
        }
        match appointment.status {
            AppointmentStatus::Pending => {
                return Err(PaymentError::Conflict("Appointment must be confirmed before payment".to_string()));
            }
            AppointmentStatus::Cancelled => {
                return Err(PaymentError::Conflict("Cannot pay for a cancelled appointment".to_string()));
            }
            _ => {}
        }
        let Some(professional_id) = appointment.professional_id else {
            return Err(PaymentError::Conflict("Appointment has no assigned professional".to_string()));
        };
        if !appointment.payment.status.is_pre_paid() {
            return Err(PaymentError::Conflict(format!(
                "Payment already {}",
                appointment.payment.status
            )));
        }

        let pricing = self.pricing
            .resolve_pricing(professional_id, appointment.therapy_type)
            .await?;
        let customer_id = self.ensure_customer(client_id, client_email).await?;

        let mut metadata = BTreeMap::new();
        metadata.insert("appointment_id".to_string(), appointment_id.to_string());
        metadata.insert("client_id".to_string(), client_id.to_string());
        metadata.insert("professional_id".to_string(), professional_id.to_string());
        metadata.insert("platform_fee".to_string(), pricing.platform_fee.to_string());
        metadata.insert("professional_payout".to_string(), pricing.professional_payout.to_string());

        let intent = self.gateway
            .create_payment_intent(&CreatePaymentIntentParams {
                amount: minor_units(pricing.price),
                currency: pricing.currency.to_lowercase(),
                customer_id,
                metadata,
            })
            .await?;

        let patch = PaymentPatch {
            price: Some(pricing.price),
            platform_fee: Some(pricing.platform_fee),
            professional_payout: Some(pricing.professional_payout),
            currency: Some(pricing.currency.clone()),
            payment_intent_id: Some(intent.id.clone()),
            ..PaymentPatch::status(PaymentStatus::Processing)
        };
        let guard = PaymentGuard::from_statuses(&[PaymentStatus::Pending, PaymentStatus::Processing]);

        if self.appointments.transition_payment(appointment_id, &guard, &patch).await?.is_none() {
            warn!("Payment for {} moved on while intent {} was created", appointment_id, intent.id);
            return Err(PaymentError::Conflict("Payment state changed concurrently".to_string()));
        }

        info!("Payment intent {} ready for appointment {}", intent.id, appointment_id);
        Ok(IntentResponse {
            client_secret: intent.client_secret,
            payment_intent_id: intent.id,
            amount: pricing.price,
            currency: pricing.currency,
        })
    }

    /// Stored customer id, else a lookup by email, else a new customer.
    async fn ensure_customer(&self, client_id: Uuid, fallback_email: Option<String>) -> Result<String, PaymentError> {
        let account = self.accounts.get(client_id).await?;
        if let Some(customer_id) = account.as_ref().and_then(|a| a.stripe_customer_id.clone()) {
            return Ok(customer_id);
        }

        let email = account
            .and_then(|a| a.email)
            .or(fallback_email)
            .ok_or_else(|| PaymentError::Validation("Client email is required for payment".to_string()))?;

        let customer = match self.gateway.find_customer_by_email(&email).await? {
            Some(existing) => {
                debug!("Reusing Stripe customer {} for {}", existing.id, client_id);
                existing
            }
            None => {
                self.gateway
                    .create_customer(&CreateCustomerParams { email, user_id: client_id })
                    .await?
            }
        };

        self.accounts.set_stripe_customer(client_id, &customer.id).await?;
        Ok(customer.id)
    }

    // ==========================================================================
    // WEBHOOK SIGNALS
    // ==========================================================================

    pub async fn handle_event(&self, event: &StripeEvent) -> Result<WebhookOutcome, PaymentError> {
        let target = match event.event_type.as_str() {
            "payment_intent.succeeded" => PaymentStatus::Paid,
            "payment_intent.payment_failed" => PaymentStatus::Failed,
            other => {
                debug!("Ignoring webhook event {} of type {}", event.id, other);
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let (Some(intent_id), Some(appointment_id)) = (event.object_id(), event.appointment_id()) else {
            warn!("Webhook event {} carries no intent or appointment reference", event.id);
            return Ok(WebhookOutcome::Ignored);
        };

        self.apply_intent_outcome(appointment_id, intent_id, target).await
    }

    /// Moves an in-flight payment to `paid` or `failed` if `intent_id` is the
    /// intent on record. A declined intent can still succeed later, so `paid`
    /// is also accepted from `failed`. Replays of an applied outcome are
    /// no-ops. A success the record cannot take is flagged for reconciliation.
    pub async fn apply_intent_outcome(
        &self,
        appointment_id: Uuid,
        intent_id: &str,
        target: PaymentStatus,
    ) -> Result<WebhookOutcome, PaymentError> {
        let from: &[PaymentStatus] = match target {
            PaymentStatus::Paid => &[PaymentStatus::Pending, PaymentStatus::Processing, PaymentStatus::Failed],
            _ => &[PaymentStatus::Pending, PaymentStatus::Processing],
        };
        let guard = PaymentGuard::from_statuses(from).with_intent(intent_id);
        let mut patch = PaymentPatch::status(target);
        if target == PaymentStatus::Paid {
            patch.paid_at = Some(Utc::now());
        }

        if self.appointments.transition_payment(appointment_id, &guard, &patch).await?.is_some() {
            info!("Appointment {} payment {} via intent {}", appointment_id, target, intent_id);
            return Ok(WebhookOutcome::Applied);
        }

        let current = self.appointments.get(appointment_id).await?;
        if let Some(ref current) = current {
            if current.payment.status == target && current.payment.payment_intent_id.as_deref() == Some(intent_id) {
                return Ok(WebhookOutcome::AlreadyApplied);
            }
        }

        if target != PaymentStatus::Paid {
            warn!(
                "Intent {} outcome {} not applied to {} ({:?})",
                intent_id, target, appointment_id, current.as_ref().map(|a| a.payment.status)
            );
            return Ok(WebhookOutcome::Ignored);
        }

        self.flag_charge(appointment_id, intent_id, current.as_ref()).await?;
        Ok(WebhookOutcome::Flagged)
    }

    async fn flag_charge(
        &self,
        appointment_id: Uuid,
        intent_id: &str,
        current: Option<&Appointment>,
    ) -> Result<(), PaymentError> {
        let reason = match current {
            None => "Captured payment references an unknown appointment".to_string(),
            Some(a) if a.payment.payment_intent_id.as_deref() != Some(intent_id) => {
                "Captured payment is not the intent on record".to_string()
            }
            Some(a) => format!("Captured payment while the record is {}", a.payment.status),
        };
        error!("Intent {} on appointment {}: {}", intent_id, appointment_id, reason);

        self.reconciliations
            .record_charge(&ChargeReconciliation {
                id: Uuid::new_v4(),
                appointment_id,
                payment_intent_id: intent_id.to_string(),
                recorded_status: current.map(|a| a.payment.status),
                recorded_intent_id: current.and_then(|a| a.payment.payment_intent_id.clone()),
                reason,
                created_at: Utc::now(),
            })
            .await
    }

    // ==========================================================================
    // REFUNDS
    // ==========================================================================

    pub async fn refund(
        &self,
        appointment_id: Uuid,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<RefundResponse, PaymentError> {
        let appointment = self.load(appointment_id).await?;

        let allowed = match actor {
            Actor::Admin => true,
            Actor::Professional(id) => appointment.professional_id == Some(id),
            Actor::Client(id) => appointment.client_id == id,
        };
        if !allowed {
            return Err(PaymentError::Forbidden("Not allowed to refund this appointment".to_string()));
        }

        if appointment.payment.status != PaymentStatus::Paid {
            return Err(refund_conflict(appointment.payment.status));
        }
        let Some(intent_id) = appointment.payment.payment_intent_id.clone() else {
            return Err(PaymentError::Conflict("Appointment has no payment intent to refund".to_string()));
        };

        let refund = self.gateway
            .refund(&RefundParams {
                payment_intent_id: intent_id.clone(),
                reason,
                idempotency_key: format!("refund-{}", appointment_id),
            })
            .await?;

        let guard = PaymentGuard::from_statuses(&[PaymentStatus::Paid]).with_intent(&intent_id);
        let patch = PaymentPatch {
            refund_id: Some(refund.id.clone()),
            refunded_at: Some(Utc::now()),
            ..PaymentPatch::status(PaymentStatus::Refunded)
        };

        let updated = match self.appointments.transition_payment(appointment_id, &guard, &patch).await {
            Ok(Some(updated)) => updated,
            Ok(None) => return Err(self.refund_not_recorded(appointment_id, &refund.id).await),
            Err(e) => {
                error!("Refund {} issued but appointment {} not updated: {}", refund.id, appointment_id, e);
                return Err(PaymentError::Reconciliation {
                    message: "Refund issued but the appointment could not be updated".to_string(),
                    details: json!({ "appointment_id": appointment_id, "refund_id": refund.id }),
                });
            }
        };

        info!("Refunded appointment {} ({})", appointment_id, refund.id);

        let notification = PaymentNotification::RefundIssued {
            appointment_id,
            client_id: updated.client_id,
            professional_id: updated.professional_id,
            amount: updated.payment.price,
            currency: updated.payment.currency.clone(),
        };
        if let Err(e) = self.notifier.send(&notification).await {
            warn!("Refund notification for {} failed: {}", appointment_id, e);
        }

        Ok(RefundResponse {
            appointment_id,
            refund_id: refund.id,
            amount: updated.payment.price,
            currency: updated.payment.currency,
        })
    }

    /// A concurrent refund that already recorded this same refund is a plain
    /// conflict; anything else means the processor and the record disagree.
    async fn refund_not_recorded(&self, appointment_id: Uuid, refund_id: &str) -> PaymentError {
        if let Ok(Some(current)) = self.appointments.get(appointment_id).await {
            if current.payment.status == PaymentStatus::Refunded
                && current.payment.refund_id.as_deref() == Some(refund_id)
            {
                return refund_conflict(PaymentStatus::Refunded);
            }
        }

        error!("Refund {} issued but appointment {} not in refundable state", refund_id, appointment_id);
        PaymentError::Reconciliation {
            message: "Refund issued but the appointment could not be updated".to_string(),
            details: json!({ "appointment_id": appointment_id, "refund_id": refund_id }),
        }
    }

    // ==========================================================================
    // PAYOUTS
    // ==========================================================================

    pub async fn payout(
        &self,
        professional_id: Uuid,
        appointment_ids: Vec<Uuid>,
    ) -> Result<PayoutResponse, PaymentError> {
        if appointment_ids.is_empty() {
            return Err(PaymentError::Validation("appointment_ids must not be empty".to_string()));
        }
        let mut requested = appointment_ids;
        requested.sort();
        requested.dedup();

        let held = self.recover_flagged(professional_id, &requested).await?;

        let eligible: Vec<Appointment> = self.appointments
            .query(&AppointmentQuery::PayoutCandidates {
                professional_id,
                appointment_ids: requested,
            })
            .await?
            .into_iter()
            .filter(|a| !held.contains(&a.id))
            .collect();
        if eligible.is_empty() {
            if !held.is_empty() {
                return Err(PaymentError::Conflict(format!(
                    "{} appointments await reconciliation of an earlier transfer",
                    held.len()
                )));
            }
            return Err(PaymentError::Conflict("No eligible appointments for payout".to_string()));
        }

        let destination = self.accounts
            .get(professional_id)
            .await?
            .and_then(|a| a.stripe_account_id)
            .ok_or_else(|| PaymentError::SetupRequired("Professional has not completed payout setup".to_string()))?;

        let currency = eligible[0].payment.currency.clone();
        if eligible.iter().any(|a| !a.payment.currency.eq_ignore_ascii_case(&currency)) {
            return Err(PaymentError::Conflict("Appointments in a payout must share one currency".to_string()));
        }

        let ids: Vec<Uuid> = eligible.iter().map(|a| a.id).collect();
        let amount: i64 = eligible.iter().map(|a| a.payment.professional_payout).sum();

        let mut metadata = BTreeMap::new();
        metadata.insert("professional_id".to_string(), professional_id.to_string());
        metadata.insert("appointment_count".to_string(), ids.len().to_string());

        let transfer = self.gateway
            .create_transfer(&TransferParams {
                amount: minor_units(amount),
                currency: currency.to_lowercase(),
                destination,
                idempotency_key: payout_idempotency_key(professional_id, &ids),
                metadata,
            })
            .await?;

        let unmarked = self.mark_batch(&ids, &transfer.id).await;
        if !unmarked.is_empty() {
            return Err(self.flag_unmarked(professional_id, &transfer.id, amount, unmarked).await);
        }

        info!("Paid out {} {} to professional {} via {}", amount, currency, professional_id, transfer.id);

        let notification = PaymentNotification::PayoutSent {
            professional_id,
            transfer_id: transfer.id.clone(),
            amount,
            currency: currency.clone(),
            appointment_count: ids.len(),
        };
        if let Err(e) = self.notifier.send(&notification).await {
            warn!("Payout notification for {} failed: {}", professional_id, e);
        }

        Ok(PayoutResponse {
            transfer_id: transfer.id,
            professional_id,
            amount,
            currency,
            appointment_ids: ids,
        })
    }

    /// Re-stamps appointments an earlier transfer already paid but left
    /// unmarked, so a retried payout never transfers for them again. Returns
    /// the requested ids that still await reconciliation.
    async fn recover_flagged(&self, professional_id: Uuid, requested: &[Uuid]) -> Result<Vec<Uuid>, PaymentError> {
        let mut held = Vec::new();

        for entry in self.reconciliations.open_payouts(professional_id).await? {
            if !entry.appointment_ids.iter().any(|id| requested.contains(id)) {
                continue;
            }

            let remaining = self.mark_batch(&entry.appointment_ids, &entry.transfer_id).await;
            if remaining.is_empty() {
                info!("Recovered marking for transfer {} ({} appointments)", entry.transfer_id, entry.appointment_ids.len());
                self.reconciliations.resolve_payout(entry.id, Utc::now()).await?;
            } else {
                warn!("Transfer {} still has {} unmarked appointments", entry.transfer_id, remaining.len());
                held.extend(remaining.into_iter().filter(|id| requested.contains(id)));
            }
        }

        Ok(held)
    }

    /// Stamps the transfer on the batch, retrying only the ids still
    /// unmarked. Returns whatever is left after the last attempt.
    async fn mark_batch(&self, ids: &[Uuid], transfer_id: &str) -> Vec<Uuid> {
        let mut remaining: Vec<Uuid> = ids.to_vec();
        let paid_out_at = Utc::now();

        for attempt in 1..=PAYOUT_MARK_ATTEMPTS {
            match self.appointments.mark_paid_out(&remaining, transfer_id, paid_out_at).await {
                Ok(marked) => remaining.retain(|id| !marked.contains(id)),
                Err(e) => warn!("Payout marking attempt {} for {} failed: {}", attempt, transfer_id, e),
            }
            if remaining.is_empty() {
                break;
            }
            debug!("{} appointments still unmarked after attempt {}", remaining.len(), attempt);
        }

        remaining
    }

    async fn flag_unmarked(
        &self,
        professional_id: Uuid,
        transfer_id: &str,
        amount: i64,
        unmarked: Vec<Uuid>,
    ) -> PaymentError {
        let entry = PayoutReconciliation {
            id: Uuid::new_v4(),
            transfer_id: transfer_id.to_string(),
            professional_id,
            appointment_ids: unmarked.clone(),
            amount,
            reason: format!("Batch marking incomplete after {} attempts", PAYOUT_MARK_ATTEMPTS),
            created_at: Utc::now(),
            resolved_at: None,
        };
        if let Err(e) = self.reconciliations.record(&entry).await {
            error!("Could not record reconciliation for transfer {}: {}", transfer_id, e);
        }

        PaymentError::Reconciliation {
            message: "Transfer created but some appointments could not be marked as paid out".to_string(),
            details: json!({
                "transfer_id": transfer_id,
                "professional_id": professional_id,
                "unmarked_appointment_ids": unmarked,
            }),
        }
    }

    pub async fn payout_status(&self, professional_id: Uuid) -> Result<PayoutStatus, PaymentError> {
        let Some(account_id) = self.accounts
            .get(professional_id)
            .await?
            .and_then(|a| a.stripe_account_id)
        else {
            return Ok(PayoutStatus::default());
        };

        let account = self.gateway.retrieve_account(&account_id).await?;
        let balance = self.gateway.retrieve_balance(&account_id).await?;
        let currency = self.pricing.platform_settings().await?.currency;

        Ok(PayoutStatus {
            setup: true,
            account_id: Some(account.id),
            details_submitted: Some(account.details_submitted),
            charges_enabled: Some(account.charges_enabled),
            payouts_enabled: Some(account.payouts_enabled),
            available: Some(major_units(balance.available_in(&currency))),
            pending: Some(major_units(balance.pending_in(&currency))),
            currency: Some(currency),
        })
    }

    pub async fn onboard(&self, professional_id: Uuid, email: Option<String>) -> Result<OnboardingLink, PaymentError> {
        let account = self.accounts.get(professional_id).await?;
        let account_id = match account.as_ref().and_then(|a| a.stripe_account_id.clone()) {
            Some(existing) => existing,
            None => {
                let created = self.gateway
                    .create_connected_account(&ConnectedAccountParams {
                        email: account.and_then(|a| a.email).or(email),
                        professional_id,
                    })
                    .await?;
                self.accounts.set_stripe_account(professional_id, &created.id).await?;
                info!("Created connected account {} for professional {}", created.id, professional_id);
                created.id
            }
        };

        let link = self.gateway
            .create_account_link(&AccountLinkParams {
                account_id: account_id.clone(),
                refresh_url: self.connect.refresh_url.clone(),
                return_url: self.connect.return_url.clone(),
            })
            .await?;

        Ok(OnboardingLink {
            account_id,
            url: link.url,
            expires_at: link.expires_at,
        })
    }
}
