// libs/payment-cell/src/services/stripe.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::error::PaymentError;
use crate::models::{
    AccountLink, AccountLinkParams, Balance, ConnectedAccount, ConnectedAccountParams,
    CreateCustomerParams, CreatePaymentIntentParams, Customer, PaymentIntent, Refund, RefundParams,
    Transfer, TransferParams,
};
use crate::services::gateway::PaymentGateway;

/// Stripe REST client (form-encoded requests, JSON responses).
/// Based on: https://docs.stripe.com/api
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

type Form = Vec<(String, String)>;

fn field(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

fn metadata_fields<'a>(metadata: impl IntoIterator<Item = (&'a String, &'a String)>) -> Form {
    metadata
        .into_iter()
        .map(|(k, v)| (format!("metadata[{}]", k), v.clone()))
        .collect()
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payments_configured() {
            return Err(PaymentError::NotConfigured);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.payment_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            secret_key: config.stripe_secret_key.clone(),
            base_url: config.stripe_api_base.trim_end_matches('/').to_string(),
        })
    }

    fn post(&self, path: &str, form: &Form) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
    }

    async fn send<T: DeserializeOwned>(&self, operation: &str, request: RequestBuilder) -> Result<T, PaymentError> {
        let response = request.send().await.map_err(|e| {
            error!("Stripe {} failed in transport: {}", operation, e);
            PaymentError::from(e)
        })?;

        let status = response.status();
        let response_text = response.text().await?;
        debug!("Stripe {} response: {}", operation, status);

        if status.is_client_error() {
            let details: Option<Value> = serde_json::from_str(&response_text).ok();
            let message = details
                .as_ref()
                .and_then(|d| d["error"]["message"].as_str())
                .unwrap_or("request rejected")
                .to_string();
            warn!("Stripe {} rejected ({}): {}", operation, status, message);
            return Err(PaymentError::Rejected {
                message,
                details: details.map(|d| d["error"].clone()),
            });
        }

        if !status.is_success() {
            error!("Stripe {} failed: {} - {}", operation, status, response_text);
            return Err(PaymentError::Provider(format!("HTTP {}: {}", status, response_text)));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            PaymentError::Provider(format!("Failed to parse {} response: {}", operation, e))
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, PaymentError> {
        let request = self.get("/customers").query(&[("email", email), ("limit", "1")]);
        let list: StripeList<Customer> = self.send("customer lookup", request).await?;
        Ok(list.data.into_iter().next())
    }

    async fn create_customer(&self, params: &CreateCustomerParams) -> Result<Customer, PaymentError> {
        let form = vec![
            field("email", &params.email),
            field("metadata[user_id]", params.user_id),
        ];
        let customer: Customer = self.send("customer creation", self.post("/customers", &form)).await?;
        info!("Created Stripe customer {}", customer.id);
        Ok(customer)
    }

    async fn create_payment_intent(&self, params: &CreatePaymentIntentParams) -> Result<PaymentIntent, PaymentError> {
        let mut form = vec![
            field("amount", params.amount),
            field("currency", &params.currency),
            field("customer", &params.customer_id),
            field("automatic_payment_methods[enabled]", "true"),
        ];
        form.extend(metadata_fields(&params.metadata));

        let intent: PaymentIntent = self.send("payment intent", self.post("/payment_intents", &form)).await?;
        info!("Created payment intent {} for {} {}", intent.id, intent.amount, intent.currency);
        Ok(intent)
    }

    async fn refund(&self, params: &RefundParams) -> Result<Refund, PaymentError> {
        let mut form = vec![
            field("payment_intent", &params.payment_intent_id),
            field("reason", "requested_by_customer"),
        ];
        if let Some(ref reason) = params.reason {
            form.push(field("metadata[reason]", reason));
        }

        let request = self
            .post("/refunds", &form)
            .header("Idempotency-Key", &params.idempotency_key);
        let refund: Refund = self.send("refund", request).await?;
        info!("Refunded payment intent {} as {}", params.payment_intent_id, refund.id);
        Ok(refund)
    }

    async fn create_connected_account(&self, params: &ConnectedAccountParams) -> Result<ConnectedAccount, PaymentError> {
        let mut form = vec![
            field("type", "express"),
            field("capabilities[transfers][requested]", "true"),
            field("metadata[professional_id]", params.professional_id),
        ];
        if let Some(ref email) = params.email {
            form.push(field("email", email));
        }

        self.send("connected account creation", self.post("/accounts", &form)).await
    }

    async fn create_account_link(&self, params: &AccountLinkParams) -> Result<AccountLink, PaymentError> {
        let form = vec![
            field("account", &params.account_id),
            field("refresh_url", &params.refresh_url),
            field("return_url", &params.return_url),
            field("type", "account_onboarding"),
        ];
        self.send("account link", self.post("/account_links", &form)).await
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<ConnectedAccount, PaymentError> {
        self.send("account retrieval", self.get(&format!("/accounts/{}", account_id))).await
    }

    async fn retrieve_balance(&self, account_id: &str) -> Result<Balance, PaymentError> {
        let request = self.get("/balance").header("Stripe-Account", account_id);
        self.send("balance retrieval", request).await
    }

    async fn create_transfer(&self, params: &TransferParams) -> Result<Transfer, PaymentError> {
        let mut form = vec![
            field("amount", params.amount),
            field("currency", &params.currency),
            field("destination", &params.destination),
        ];
        form.extend(metadata_fields(&params.metadata));

        let request = self
            .post("/transfers", &form)
            .header("Idempotency-Key", &params.idempotency_key);
        let transfer: Transfer = self.send("transfer", request).await?;
        info!("Created transfer {} of {} {} to {}", transfer.id, transfer.amount, transfer.currency, params.destination);
        Ok(transfer)
    }
}
