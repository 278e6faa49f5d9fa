// libs/payment-cell/src/services/notification.rs
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::PaymentError;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentNotification {
    RefundIssued {
        appointment_id: Uuid,
        client_id: Uuid,
        professional_id: Option<Uuid>,
        amount: i64,
        currency: String,
    },
    PayoutSent {
        professional_id: Uuid,
        transfer_id: String,
        amount: i64,
        currency: String,
        appointment_count: usize,
    },
}

/// Posts payment events to the configured webhook; without one, events are
/// only logged. Callers treat failures as non-fatal.
pub struct PaymentNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl PaymentNotifier {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.payment_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            webhook_url: config.notification_webhook_url.clone(),
        }
    }

    pub fn log_only() -> Self {
        Self {
            client: Client::new(),
            webhook_url: None,
        }
    }

    pub async fn send(&self, notification: &PaymentNotification) -> Result<(), PaymentError> {
        let Some(ref url) = self.webhook_url else {
            info!("Payment notification (no webhook configured): {:?}", notification);
            return Ok(());
        };

        debug!("Posting payment notification to {}", url);
        let response = self.client.post(url).json(notification).send().await?;
        if !response.status().is_success() {
            return Err(PaymentError::Provider(format!(
                "Notification webhook answered {}",
                response.status()
            )));
        }
        Ok(())
    }
}
