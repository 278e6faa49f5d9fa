use std::collections::BTreeMap;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::models::{RefundParams, TransferParams};
use payment_cell::{PaymentError, PaymentGateway, StripeClient};
use shared_utils::test_utils::TestConfig;

fn client_for(server: &MockServer) -> StripeClient {
    let mut config = TestConfig::default().to_app_config();
    config.stripe_api_base = format!("{}/v1", server.uri());
    StripeClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_find_customer_by_email() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .and(query_param("email", "client@example.com"))
        .and(header("Authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "id": "cus_1", "email": "client@example.com" }]
        })))
        .mount(&server)
        .await;

    let customer = client_for(&server).find_customer_by_email("client@example.com").await.unwrap();
    assert_eq!(customer.map(|c| c.id), Some("cus_1".to_string()));
}

#[tokio::test]
async fn test_refund_sends_idempotency_key() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let key = format!("refund-{}", appointment_id);

    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .and(header("Idempotency-Key", key.as_str()))
        .and(body_string_contains("payment_intent=pi_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "re_1", "amount": 12000, "status": "succeeded"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refund = client_for(&server)
        .refund(&RefundParams {
            payment_intent_id: "pi_1".to_string(),
            reason: None,
            idempotency_key: key.clone(),
        })
        .await
        .unwrap();
    assert_eq!(refund.id, "re_1");
}

#[tokio::test]
async fn test_transfer_form_encodes_metadata() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transfers"))
        .and(body_string_contains("amount=21600"))
        .and(body_string_contains("destination=acct_1"))
        .and(body_string_contains("metadata%5Bprofessional_id%5D="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "tr_1", "amount": 21600, "currency": "cad", "destination": "acct_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut metadata = BTreeMap::new();
    metadata.insert("professional_id".to_string(), Uuid::new_v4().to_string());

    let transfer = client_for(&server)
        .create_transfer(&TransferParams {
            amount: 21600,
            currency: "cad".to_string(),
            destination: "acct_1".to_string(),
            idempotency_key: "payout-abc".to_string(),
            metadata,
        })
        .await
        .unwrap();
    assert_eq!(transfer.amount, 21600);
}

#[tokio::test]
async fn test_client_error_is_rejection_with_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/refunds"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "charge_already_refunded",
                "message": "Charge ch_1 has already been refunded."
            }
        })))
        .mount(&server)
        .await;

    let result = client_for(&server)
        .refund(&RefundParams {
            payment_intent_id: "pi_1".to_string(),
            reason: None,
            idempotency_key: "refund-x".to_string(),
        })
        .await;

    assert_matches!(
        result,
        Err(PaymentError::Rejected { ref message, ref details })
            if message.contains("already been refunded")
                && details.as_ref().map(|d| d["code"] == "charge_already_refunded").unwrap_or(false)
    );
}

#[tokio::test]
async fn test_server_error_is_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/accounts/acct_1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    assert_matches!(
        client_for(&server).retrieve_account("acct_1").await,
        Err(PaymentError::Provider(_))
    );
}

#[tokio::test]
async fn test_balance_uses_connected_account_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/balance"))
        .and(header("Stripe-Account", "acct_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "available": [{ "amount": 5000, "currency": "cad" }],
            "pending": []
        })))
        .mount(&server)
        .await;

    let balance = client_for(&server).retrieve_balance("acct_9").await.unwrap();
    assert_eq!(balance.available_in("CAD"), 5000);
    assert_eq!(balance.pending_in("CAD"), 0);
}

#[test]
fn test_unconfigured_client() {
    let mut config = TestConfig::default().to_app_config();
    config.stripe_secret_key = String::new();
    assert_matches!(StripeClient::new(&config), Err(PaymentError::NotConfigured));
}
