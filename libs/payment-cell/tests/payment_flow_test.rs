use std::sync::Arc;

use axum::body::{to_bytes, Body};
use chrono::{NaiveDate, Utc};
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    Appointment, AppointmentStatus, AppointmentType, BookAppointmentRequest, PaymentStatus, TherapyType,
};
use appointment_cell::services::memory::MemoryAppointmentStore;
use payment_cell::models::UserAccount;
use payment_cell::services::accounts::SupabaseReconciliationStore;
use payment_cell::services::memory::{MemoryAccountStore, MemoryReconciliationStore};
use payment_cell::services::notification::PaymentNotifier;
use payment_cell::services::webhook::sign_payload;
use payment_cell::*;
use pricing_cell::services::memory::MemoryPricingStore;
use pricing_cell::PricingService;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct Fixture {
    config: TestConfig,
    appointments: Arc<MemoryAppointmentStore>,
    accounts: Arc<MemoryAccountStore>,
    app: axum::Router,
}

fn fixture(stripe: &MockServer) -> Fixture {
    let config = TestConfig {
        stripe_api_base: format!("{}/v1", stripe.uri()),
        ..TestConfig::default()
    };
    let app_config = config.to_arc();

    let appointments = Arc::new(MemoryAppointmentStore::new());
    let accounts = Arc::new(MemoryAccountStore::new());
    let payments = PaymentService::new(PaymentDependencies {
        appointments: appointments.clone(),
        accounts: accounts.clone(),
        reconciliations: Arc::new(MemoryReconciliationStore::new()),
        gateway: Arc::new(StripeClient::new(&app_config).unwrap()),
        pricing: Arc::new(PricingService::new(Arc::new(MemoryPricingStore::new()))),
        notifier: Arc::new(PaymentNotifier::log_only()),
        connect: PaymentState::connect_urls(&app_config),
    });
    let app = payment_routes(PaymentState::new(app_config, payments));

    Fixture { config, appointments, accounts, app }
}

async fn scheduled_appointment(store: &MemoryAppointmentStore, client_id: Uuid, professional_id: Uuid) -> Appointment {
    let mut appointment = BookAppointmentRequest {
        client_id,
        date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        time: "14:00".to_string(),
        duration: 50,
        appointment_type: AppointmentType::Video,
        therapy_type: TherapyType::Solo,
        issue_type: None,
        notes: None,
        proposed_to: vec![],
    }
    .into_appointment(Utc::now());
    appointment.apply_acceptance(professional_id, Utc::now());
    appointment.status = AppointmentStatus::Scheduled;
    store.put(appointment.clone()).await;
    appointment
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_intent_then_webhook_marks_paid() {
    let stripe = MockServer::start().await;
    let fx = fixture(&stripe);
    let client = TestUser::client("client@example.com");
    let appointment = scheduled_appointment(&fx.appointments, client.uuid(), Uuid::new_v4()).await;

    Mock::given(method("GET"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&stripe)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cus_new", "email": "client@example.com" })))
        .expect(1)
        .mount(&stripe)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/payment_intents"))
        .and(body_string_contains("amount=12000"))
        .and(body_string_contains("currency=cad"))
        .and(body_string_contains("customer=cus_new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_123",
            "client_secret": "pi_123_secret_abc",
            "amount": 12000,
            "currency": "cad",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&stripe)
        .await;

    let token = JwtTestUtils::create_test_token(&client, &fx.config.jwt_secret, Some(1));
    let (status, body) = call(
        &fx.app,
        Request::builder()
            .method("POST")
            .uri("/intent")
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "appointment_id": appointment.id }).to_string()))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_intent_id"], "pi_123");
    assert_eq!(body["client_secret"], "pi_123_secret_abc");
    assert_eq!(body["amount"], 120);
    assert_eq!(body["currency"], "CAD");

    let stored = fx.appointments.snapshot(appointment.id).await.unwrap();
    assert_eq!(stored.payment.status, PaymentStatus::Processing);
    assert_eq!(stored.payment.platform_fee, 12);
    assert_eq!(stored.payment.professional_payout, 108);
    assert_eq!(
        fx.accounts.get(client.uuid()).await.unwrap().and_then(|a| a.stripe_customer_id),
        Some("cus_new".to_string())
    );

    let event = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": {
            "id": "pi_123",
            "metadata": { "appointment_id": appointment.id.to_string() }
        }}
    })
    .to_string();
    let signature = sign_payload(event.as_bytes(), &fx.config.stripe_webhook_secret, Utc::now().timestamp());

    let (status, body) = call(
        &fx.app,
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Stripe-Signature", signature)
            .body(Body::from(event))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");
    assert_eq!(
        fx.appointments.snapshot(appointment.id).await.unwrap().payment.status,
        PaymentStatus::Paid
    );
}

#[tokio::test]
async fn test_intent_for_unconfirmed_appointment_is_conflict() {
    let stripe = MockServer::start().await;
    let fx = fixture(&stripe);
    let client = TestUser::client("client@example.com");
    let mut appointment = scheduled_appointment(&fx.appointments, client.uuid(), Uuid::new_v4()).await;
    appointment.status = AppointmentStatus::Pending;
    fx.appointments.put(appointment.clone()).await;

    let token = JwtTestUtils::create_test_token(&client, &fx.config.jwt_secret, Some(1));
    let (status, body) = call(
        &fx.app,
        Request::builder()
            .method("POST")
            .uri("/intent")
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "appointment_id": appointment.id }).to_string()))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
    assert!(stripe.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let stripe = MockServer::start().await;
    let fx = fixture(&stripe);

    let (status, _) = call(
        &fx.app,
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("Stripe-Signature", format!("t={},v1=00ff", Utc::now().timestamp()))
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payout_status_without_account() {
    let stripe = MockServer::start().await;
    let fx = fixture(&stripe);
    let professional = TestUser::professional("pro@example.com");
    let token = JwtTestUtils::create_test_token(&professional, &fx.config.jwt_secret, Some(1));

    let (status, body) = call(
        &fx.app,
        Request::builder()
            .uri("/payouts/status")
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "setup": false }));
}

#[tokio::test]
async fn test_onboarding_reuses_existing_account() {
    let stripe = MockServer::start().await;
    let fx = fixture(&stripe);
    let professional = TestUser::professional("pro@example.com");
    fx.accounts.put(UserAccount {
        id: professional.uuid(),
        email: Some("pro@example.com".to_string()),
        stripe_customer_id: None,
        stripe_account_id: Some("acct_existing".to_string()),
    }).await;

    Mock::given(method("POST"))
        .and(path("/v1/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "acct_other" })))
        .expect(0)
        .mount(&stripe)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/account_links"))
        .and(body_string_contains("account=acct_existing"))
        .and(body_string_contains("type=account_onboarding"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://connect.stripe.com/setup/e/acct_existing/abc",
            "expires_at": 1_900_000_000
        })))
        .expect(1)
        .mount(&stripe)
        .await;

    let token = JwtTestUtils::create_test_token(&professional, &fx.config.jwt_secret, Some(1));
    let (status, body) = call(
        &fx.app,
        Request::builder()
            .method("POST")
            .uri("/connect/onboard")
            .header("Authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_id"], "acct_existing");
}

#[tokio::test]
async fn test_payout_is_admin_only() {
    let stripe = MockServer::start().await;
    let fx = fixture(&stripe);
    let professional = TestUser::professional("pro@example.com");
    let token = JwtTestUtils::create_test_token(&professional, &fx.config.jwt_secret, Some(1));

    let (status, _) = call(
        &fx.app,
        Request::builder()
            .method("POST")
            .uri("/payouts")
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .body(Body::from(json!({
                "professional_id": professional.uuid(),
                "appointment_ids": [Uuid::new_v4()]
            }).to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_supabase_reconciliation_store_reads_open_and_resolves() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let entry_id = Uuid::new_v4();
    let row = json!({
        "id": entry_id,
        "transfer_id": "tr_open",
        "professional_id": professional_id,
        "appointment_ids": [Uuid::new_v4()],
        "amount": 108,
        "reason": "Batch marking incomplete after 3 attempts",
        "created_at": Utc::now().to_rfc3339(),
        "resolved_at": null
    });

    Mock::given(method("GET"))
        .and(path("/rest/v1/payout_reconciliations"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .and(query_param("resolved_at", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payout_reconciliations"))
        .and(query_param("id", format!("eq.{}", entry_id)))
        .and(body_string_contains("resolved_at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = server.uri();
    let store = SupabaseReconciliationStore::new(Arc::new(SupabaseClient::new(&config)));

    let open = store.open_payouts(professional_id).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].transfer_id, "tr_open");
    assert!(open[0].resolved_at.is_none());

    store.resolve_payout(entry_id, Utc::now()).await.unwrap();
}
