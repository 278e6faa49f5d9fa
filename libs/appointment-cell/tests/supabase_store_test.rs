use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::*;
use appointment_cell::{RoutingService, SupabaseAppointmentStore};
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn routing_for(server: &MockServer) -> RoutingService {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = server.uri();
    let supabase = Arc::new(SupabaseClient::new(&config));
    RoutingService::new(Arc::new(SupabaseAppointmentStore::new(supabase)))
}

#[tokio::test]
async fn test_accept_is_conditional_patch() {
    let server = MockServer::start().await;
    let (id, client_id, professional_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut accepted = MockSupabaseResponses::appointment_row(id, client_id, &[]);
    accepted["professional_id"] = json!(professional_id);
    accepted["routing_status"] = json!("accepted");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .and(query_param("professional_id", "is.null"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("refused_by", format!("not.cs.{{{}}}", professional_id)))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({
            "professional_id": professional_id,
            "routing_status": "accepted"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([accepted])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = routing_for(&server).accept(id, professional_id).await.unwrap();
    assert_eq!(appointment.professional_id, Some(professional_id));
    assert_eq!(appointment.routing_status, RoutingStatus::Accepted);
}

#[tokio::test]
async fn test_lost_accept_race_reports_conflict() {
    let server = MockServer::start().await;
    let (id, client_id) = (Uuid::new_v4(), Uuid::new_v4());

    let mut taken = MockSupabaseResponses::appointment_row(id, client_id, &[]);
    taken["professional_id"] = json!(Uuid::new_v4());
    taken["routing_status"] = json!("accepted");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([taken])))
        .mount(&server)
        .await;

    assert_matches!(
        routing_for(&server).accept(id, Uuid::new_v4()).await,
        Err(AppointmentError::AlreadyAssigned)
    );
}

#[tokio::test]
async fn test_accept_missing_appointment() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert_matches!(
        routing_for(&server).accept(Uuid::new_v4(), Uuid::new_v4()).await,
        Err(AppointmentError::NotFound)
    );
}

#[tokio::test]
async fn test_refuse_calls_rpc_and_detects_cascade() {
    let server = MockServer::start().await;
    let (id, client_id, professional_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut refused = MockSupabaseResponses::appointment_row(id, client_id, &[professional_id]);
    refused["routing_status"] = json!("general");
    refused["refused_by"] = json!([professional_id]);
    refused["refusals"] = json!([{
        "professional_id": professional_id,
        "reason": "caseload full",
        "refused_at": "2025-03-02T09:00:00Z"
    }]);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/refuse_appointment"))
        .and(body_partial_json(json!({
            "p_appointment_id": id,
            "p_professional_id": professional_id,
            "p_reason": "caseload full"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([refused])))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = routing_for(&server)
        .refuse(id, professional_id, Some("caseload full".to_string()))
        .await
        .unwrap();
    assert!(outcome.cascaded);
    assert_eq!(outcome.appointment.refusals.len(), 1);
}

#[tokio::test]
async fn test_general_pool_query_filters() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("routing_status", "in.(general,refused)"))
        .and(query_param("status", "eq.pending"))
        .and(query_param("professional_id", "is.null"))
        .and(query_param("therapy_type", "eq.group"))
        .and(query_param("order", "date.asc,time.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(Uuid::new_v4(), Uuid::new_v4(), &[])
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let pool = routing_for(&server)
        .general_pool(
            professional_id,
            GeneralPoolFilters { therapy_type: Some(TherapyType::Group), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_store_errors_surface_as_database_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("connection reset", "XX000"),
        ))
        .mount(&server)
        .await;

    assert_matches!(
        routing_for(&server).proposed_to(Uuid::new_v4()).await,
        Err(AppointmentError::DatabaseError(_))
    );
}
