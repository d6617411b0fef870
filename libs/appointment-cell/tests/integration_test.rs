use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::clock::ist;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

async fn app_for(mock_server: &MockServer, user: &TestUser) -> (Router, String) {
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let app = appointment_routes(config.to_arc());
    let token = JwtTestUtils::create_test_token(user, &config.jwt_secret, None);
    (app, token)
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn json_request(http_method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(http_method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn tomorrow_at_ten() -> (String, String) {
    let tomorrow = (Utc::now() + Duration::days(1)).with_timezone(&ist());
    (
        tomorrow.format("%Y-%m-%d").to_string(),
        tomorrow
            .date_naive()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_local_timezone(ist())
            .unwrap()
            .to_rfc3339(),
    )
}

/// Mounts the party lookups and link writes the create path needs.
async fn setup_party_mocks(
    mock_server: &MockServer,
    patient_id: &str,
    doctor_id: &str,
    profile_id: &str,
) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(patient_id, "patient@example.com", "Test Patient")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(
                profile_id,
                doctor_id,
                "doctor@example.com",
                "Dr. Test",
                "General Medicine"
            )
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(patient_id, "patient@example.com", "Test Patient")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(
                profile_id,
                doctor_id,
                "doctor@example.com",
                "Dr. Test",
                "General Medicine"
            )
        ])))
        .mount(mock_server)
        .await;
}

// ==============================================================================
// AUTHENTICATION
// ==============================================================================

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let mock_server = MockServer::start().await;
    let (app, _token) = app_for(&mock_server, &TestUser::patient("p@example.com")).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/upcoming")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_tokens_are_rejected() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("p@example.com");
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    let app = appointment_routes(config.to_arc());
    let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);

    let response = app.oneshot(get_request("/upcoming", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ==============================================================================
// CREATION
// ==============================================================================

#[tokio::test]
async fn patient_books_an_appointment_for_tomorrow() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4().to_string();
    let profile_id = Uuid::new_v4().to_string();
    let (date, scheduled_at) = tomorrow_at_ten();

    setup_party_mocks(&mock_server, &patient.id, &doctor_id, &profile_id).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &patient.id,
                &doctor_id,
                &profile_id,
                &scheduled_at
            )
        ])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            &token,
            json!({
                "patient_id": patient.id,
                "doctor_id": doctor_id,
                "appointment_date": date,
                "appointment_time": "10:00 AM",
                "appointment_type": "consultation",
                "mode": "in-person"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["appointment"]["status"], json!("scheduled"));
    assert_eq!(body["appointment"]["location"], json!("Clinic"));
}

#[tokio::test]
async fn creation_rejects_a_past_date() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let (app, token) = app_for(&mock_server, &patient).await;

    let yesterday = (Utc::now() - Duration::days(1)).with_timezone(&ist());

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            &token,
            json!({
                "patient_id": patient.id,
                "doctor_id": Uuid::new_v4(),
                "appointment_date": yesterday.format("%Y-%m-%d").to_string(),
                "appointment_time": "10:00 AM",
                "appointment_type": "consultation",
                "mode": "in-person"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("future"));
}

#[tokio::test]
async fn creation_rejects_a_lowercase_meridiem() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let (app, token) = app_for(&mock_server, &patient).await;
    let (date, _) = tomorrow_at_ten();

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            &token,
            json!({
                "patient_id": patient.id,
                "doctor_id": Uuid::new_v4(),
                "appointment_date": date,
                "appointment_time": "9:30pm",
                "appointment_type": "consultation",
                "mode": "in-person"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creation_fails_when_the_doctor_is_unknown() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let doctor_id = Uuid::new_v4().to_string();
    let (date, _) = tomorrow_at_ten();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient.id, "patient@example.com", "Test Patient")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            &token,
            json!({
                "patient_id": patient.id,
                "doctor_id": doctor_id,
                "appointment_date": date,
                "appointment_time": "10:00",
                "appointment_type": "check-up",
                "mode": "online"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await;
    assert_eq!(body["error"], json!("Doctor not found"));
}

#[tokio::test]
async fn patient_cannot_book_for_another_patient() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let (app, token) = app_for(&mock_server, &patient).await;
    let (date, _) = tomorrow_at_ten();

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            &token,
            json!({
                "patient_id": Uuid::new_v4(),
                "doctor_id": Uuid::new_v4(),
                "appointment_date": date,
                "appointment_time": "10:00 AM",
                "appointment_type": "consultation",
                "mode": "in-person"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn frontline_workers_cannot_book() {
    let mock_server = MockServer::start().await;
    let frontline = TestUser::frontline("frontline@example.com");
    let (app, token) = app_for(&mock_server, &frontline).await;
    let (date, _) = tomorrow_at_ten();

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            &token,
            json!({
                "patient_id": Uuid::new_v4(),
                "doctor_id": Uuid::new_v4(),
                "appointment_date": date,
                "appointment_time": "10:00 AM",
                "appointment_type": "consultation",
                "mode": "in-person"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ==============================================================================
// TRANSITIONS
// ==============================================================================
//
// The write path has no locking: two callers racing confirm against cancel on
// the same id both read the pre-transition row and the last PATCH wins. That
// is accepted for this domain's contention profile; these tests exercise the
// single-writer behavior only.

#[tokio::test]
async fn doctor_confirms_a_scheduled_appointment() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let (_, scheduled_at) = tomorrow_at_ten();

    let scheduled = MockSupabaseResponses::appointment_response(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        &doctor.id,
        &Uuid::new_v4().to_string(),
        &scheduled_at,
    );
    let mut confirmed = scheduled.clone();
    confirmed["status"] = json!("confirmed");
    confirmed["last_updated_by"] = json!("doctor");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "confirmed",
            "last_updated_by": "doctor"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &doctor).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/{}/confirm", appointment_id),
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["appointment"]["status"], json!("confirmed"));
}

#[tokio::test]
async fn reconfirming_is_rejected_with_the_current_status() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let (_, scheduled_at) = tomorrow_at_ten();

    let mut confirmed = MockSupabaseResponses::appointment_response(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        &doctor.id,
        &Uuid::new_v4().to_string(),
        &scheduled_at,
    );
    confirmed["status"] = json!("confirmed");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &doctor).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/{}/confirm", appointment_id),
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("confirmed"));
}

#[tokio::test]
async fn patient_cancels_inside_the_late_window_with_a_reason() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    // 23 hours out: inside the 24h window, so the cancellation is late
    let scheduled_at = (Utc::now() + Duration::hours(23))
        .with_timezone(&ist())
        .to_rfc3339();

    let scheduled = MockSupabaseResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        &scheduled_at,
    );
    let mut cancelled = scheduled.clone();
    cancelled["status"] = json!("cancelled-by-patient");
    cancelled["cancellation"] = json!({
        "cancelled_by": "patient",
        "cancelled_at": Utc::now().with_timezone(&ist()).to_rfc3339(),
        "reason": "schedule conflict",
        "is_late_cancellation": true
    });

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&mock_server)
        .await;

    // The PATCH must carry the late flag and the caller's reason
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "cancelled-by-patient",
            "cancellation": {
                "cancelled_by": "patient",
                "reason": "schedule conflict",
                "is_late_cancellation": true
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/{}/cancel", appointment_id),
            &token,
            json!({"reason": "schedule conflict"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["appointment"]["status"], json!("cancelled-by-patient"));
    assert_eq!(
        body["appointment"]["cancellation"]["is_late_cancellation"],
        json!(true)
    );
}

#[tokio::test]
async fn cancelling_twice_fails_on_the_second_attempt() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let (_, scheduled_at) = tomorrow_at_ten();

    let mut cancelled = MockSupabaseResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        &scheduled_at,
    );
    cancelled["status"] = json!("cancelled-by-patient");
    cancelled["cancellation"] = json!({
        "cancelled_by": "patient",
        "cancelled_at": scheduled_at,
        "reason": "No reason provided.",
        "is_late_cancellation": false
    });

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/{}/cancel", appointment_id),
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("cancelled-by-patient"));
}

#[tokio::test]
async fn completing_overwrites_notes() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let (_, scheduled_at) = tomorrow_at_ten();

    let mut confirmed = MockSupabaseResponses::appointment_response(
        &appointment_id,
        &Uuid::new_v4().to_string(),
        &doctor.id,
        &Uuid::new_v4().to_string(),
        &scheduled_at,
    );
    confirmed["status"] = json!("confirmed");
    let mut completed = confirmed.clone();
    completed["status"] = json!("completed");
    completed["notes"] = json!("all good");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([confirmed])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "completed",
            "notes": "all good"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([completed])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &doctor).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/{}/complete", appointment_id),
            &token,
            json!({"notes": "all good"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["appointment"]["status"], json!("completed"));
    assert_eq!(body["appointment"]["notes"], json!("all good"));
}

#[tokio::test]
async fn patients_cannot_confirm() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let (_, scheduled_at) = tomorrow_at_ten();

    let scheduled = MockSupabaseResponses::appointment_response(
        &appointment_id,
        &patient.id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        &scheduled_at,
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([scheduled])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/{}/confirm", appointment_id),
            &token,
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ==============================================================================
// SCOPED LISTINGS
// ==============================================================================

#[tokio::test]
async fn upcoming_is_scoped_to_the_calling_patient() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let (_, scheduled_at) = tomorrow_at_ten();

    // The mock only answers the patient-scoped query; an unscoped or
    // wrongly-scoped request would fall through and fail the test.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient.id)))
        .and(query_param("order", "scheduled_at.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &patient.id,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &scheduled_at
            )
        ])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app.oneshot(get_request("/upcoming", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn past_is_scoped_to_the_calling_doctor_and_descending() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let last_week = (Utc::now() - Duration::days(7))
        .with_timezone(&ist())
        .to_rfc3339();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor.id)))
        .and(query_param("order", "scheduled_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &doctor.id,
                &Uuid::new_v4().to_string(),
                &last_week
            )
        ])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &doctor).await;

    let response = app.oneshot(get_request("/past", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn admins_have_no_scoped_upcoming_view() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let (app, token) = app_for(&mock_server, &admin).await;

    let response = app.oneshot(get_request("/upcoming", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn range_queries_include_the_whole_end_day() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");

    // end_date 2025-07-15 means the window closes at IST midnight on the 16th
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient.id)))
        .and(query_param("scheduled_at", "gte.2025-07-10T00:00:00+05:30"))
        .and(query_param("scheduled_at", "lt.2025-07-16T00:00:00+05:30"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(get_request(
            "/range?start_date=2025-07-10&end_date=2025-07-15",
            &token,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn range_rejects_a_reversed_window() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(get_request(
            "/range?start_date=2025-07-15&end_date=2025-07-10",
            &token,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ==============================================================================
// LIST-ALL AND STATS
// ==============================================================================

#[tokio::test]
async fn list_all_returns_denormalized_rows_for_admins() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let (_, scheduled_at) = tomorrow_at_ten();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "scheduled_at": scheduled_at,
            "status": "scheduled",
            "appointment_type": "consultation",
            "mode": "online",
            "location": "Clinic",
            "patient": {"full_name": "Test Patient", "email": "patient@example.com"},
            "doctor_profile": {"full_name": "Dr. Test", "specialization": "Cardiology"}
        }])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &admin).await;

    let response = app.oneshot(get_request("/", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["count"], json!(1));
    assert_eq!(
        body["appointments"][0]["doctor_profile"]["specialization"],
        json!("Cardiology")
    );
}

#[tokio::test]
async fn list_all_is_forbidden_for_patients() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app.oneshot(get_request("/", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stats_group_by_status_and_omit_absent_statuses() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("select", "status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"status": "scheduled"},
            {"status": "scheduled"},
            {"status": "completed"}
        ])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &admin).await;

    let response = app.oneshot(get_request("/stats", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["total"], json!(3));
    assert_eq!(body["by_status"]["scheduled"], json!(2));
    assert_eq!(body["by_status"]["completed"], json!(1));
    // Absent statuses are missing, not zero-filled
    assert!(body["by_status"].get("confirmed").is_none());
}

#[tokio::test]
async fn stats_are_forbidden_for_patients() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app.oneshot(get_request("/stats", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// ==============================================================================
// VIEW AND DELETE
// ==============================================================================

#[tokio::test]
async fn unrelated_patients_cannot_view_an_appointment() {
    let mock_server = MockServer::start().await;
    let outsider = TestUser::patient("other@example.com");
    let appointment_id = Uuid::new_v4().to_string();
    let (_, scheduled_at) = tomorrow_at_ten();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &scheduled_at
            )
        ])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &outsider).await;

    let response = app
        .oneshot(get_request(&format!("/{}", appointment_id), &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_appointments_are_a_404() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(get_request(&format!("/{}", Uuid::new_v4()), &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_hard_delete_unlinks_both_parties() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let appointment_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4().to_string();
    let doctor_id = Uuid::new_v4().to_string();
    let profile_id = Uuid::new_v4().to_string();
    let (_, scheduled_at) = tomorrow_at_ten();

    let row = MockSupabaseResponses::appointment_response(
        &appointment_id.to_string(),
        &patient_id,
        &doctor_id,
        &profile_id,
        &scheduled_at,
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "patient@example.com", "Test Patient")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_profile_response(
                &profile_id,
                &doctor_id,
                "doctor@example.com",
                "Dr. Test",
                "General Medicine"
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &admin).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/{}", appointment_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn patients_cannot_hard_delete() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4();
    let (_, scheduled_at) = tomorrow_at_ten();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id.to_string(),
                &patient.id,
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &scheduled_at
            )
        ])))
        .mount(&mock_server)
        .await;

    let (app, token) = app_for(&mock_server, &patient).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/{}", appointment_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
