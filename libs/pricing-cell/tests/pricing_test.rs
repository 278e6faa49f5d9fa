use std::sync::Arc;

use axum::body::{to_bytes, Body};
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pricing_cell::services::memory::MemoryPricingStore;
use pricing_cell::*;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn supabase_store(server: &MockServer) -> SupabasePricingStore {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = server.uri();
    SupabasePricingStore::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn test_supabase_store_falls_back_to_platform_defaults() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/platform_settings"))
        .and(query_param("key", "eq.global"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::platform_settings_row()
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_pricing"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let service = PricingService::new(Arc::new(supabase_store(&server)));
    let pricing = service.resolve_pricing(professional_id, TherapyType::Solo).await.unwrap();

    assert_eq!(pricing.price, 120);
    assert_eq!(pricing.platform_fee, 12);
    assert_eq!(pricing.professional_payout, 108);
    assert_eq!(pricing.currency, "CAD");
    assert_eq!(pricing.source, PricingSource::Platform);
}

#[tokio::test]
async fn test_supabase_store_uses_professional_price_columns() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/platform_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::platform_settings_row()
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professional_pricing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "professional_id": professional_id,
            "solo_price": 95,
            "couple_price": null,
            "group_price": null,
            "updated_at": null
        }])))
        .mount(&server)
        .await;

    let service = PricingService::new(Arc::new(supabase_store(&server)));

    let solo = service.resolve_pricing(professional_id, TherapyType::Solo).await.unwrap();
    assert_eq!(solo.price, 95);
    assert_eq!(solo.platform_fee + solo.professional_payout, 95);
    assert_eq!(solo.source, PricingSource::Professional);

    let couple = service.resolve_pricing(professional_id, TherapyType::Couple).await.unwrap();
    assert_eq!(couple.price, 150);
    assert_eq!(couple.source, PricingSource::Platform);
}

#[tokio::test]
async fn test_settings_lazily_created_when_missing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/platform_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/platform_settings"))
        .and(query_param("on_conflict", "key"))
        .and(header("Prefer", "resolution=ignore-duplicates,return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::platform_settings_row()
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = PricingService::new(Arc::new(supabase_store(&server)));
    let settings = service.platform_settings().await.unwrap();
    assert_eq!(settings.default_prices.group, 80);
    assert_eq!(settings.platform_fee_percentage, 10.0);
}

#[tokio::test]
async fn test_fee_reconciles_for_every_type_and_source() {
    let store = Arc::new(MemoryPricingStore::new());
    let with_prices = Uuid::new_v4();
    store.set_professional_pricing(ProfessionalPricing {
        professional_id: with_prices,
        solo: Some(133),
        couple: Some(197),
        group: Some(61),
        updated_at: None,
    }).await;
    store.set_platform_settings(PlatformSettings {
        platform_fee_percentage: 12.5,
        ..PlatformSettings::default()
    }).await;
    let service = PricingService::new(store);

    for professional_id in [with_prices, Uuid::new_v4()] {
        for therapy_type in TherapyType::ALL {
            let pricing = service.resolve_pricing(professional_id, therapy_type).await.unwrap();
            assert_eq!(
                pricing.price,
                pricing.platform_fee + pricing.professional_payout,
                "{:?} from {:?}", therapy_type, pricing.source
            );
        }
    }
}

#[tokio::test]
async fn test_concurrent_first_reads_share_one_settings_row() {
    let store = Arc::new(MemoryPricingStore::new());
    let service = Arc::new(PricingService::new(store));

    let reads = (0..8).map(|_| {
        let service = service.clone();
        async move { service.platform_settings().await }
    });
    let results = futures::future::join_all(reads).await;

    assert!(results.iter().all(|r| r.as_ref().map(|s| s.currency == "CAD").unwrap_or(false)));
}

#[tokio::test]
async fn test_pricing_route_requires_auth_and_resolves() {
    let config = TestConfig::default();
    let state = PricingState::new(config.to_arc(), Arc::new(MemoryPricingStore::new()));
    let app = pricing_routes(state);
    let professional_id = Uuid::new_v4();

    let unauthenticated = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/{}?therapy_type=couple", professional_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let token = JwtTestUtils::create_test_token(&TestUser::client("c@example.com"), &config.jwt_secret, Some(1));
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/{}?therapy_type=couple", professional_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["pricing"]["price"], 150);
    assert_eq!(body["pricing"]["platform_fee"], 15);
    assert_eq!(body["pricing"]["professional_payout"], 135);
    assert_eq!(body["pricing"]["source"], "platform");
}
