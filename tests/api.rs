//! End-to-end tests for the HTTP surface, driving the router in-process over
//! the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use gatepass_server::config::Config;
use gatepass_server::notify::LogMailer;
use gatepass_server::routes::create_routes;
use gatepass_server::state::AppState;
use gatepass_server::store::memory::MemoryStore;

const ADMIN_PASSWORD: &str = "hunter2";

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        site_url: "https://tickets.example".to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        cors_allowed_origins: vec![],
        session_ttl_hours: 12,
        hsts_enabled: false,
    }
}

fn test_app() -> Router {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store, Arc::new(LogMailer), test_config());
    create_routes(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

async fn login(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/login",
        None,
        Some(json!({ "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["token"].as_str().unwrap().to_string()
}

/// Create and publish a default budgeted form, returning its id.
async fn publish_default_form(app: &Router, token: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/forms",
        Some(token),
        Some(json!({ "title": "Hackathon 2026" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let form_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = send(
        app,
        Method::POST,
        &format!("/api/admin/forms/{form_id}/publish"),
        Some(token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    form_id
}

fn valid_submission(group_size: i64) -> Value {
    json!({
        "name": "Ada Lovelace",
        "email": "ada@example.org",
        "phone": "+44 20 7946 0123",
        "groupSize": group_size,
        "teamMembers": [
            { "name": "Ada Lovelace", "email": "ada@example.org", "phone": "+44 20 7946 0123" }
        ]
    })
}

/// Register a submission and return the assigned ticket id.
async fn register(app: &Router, group_size: i64) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/register",
        None,
        Some(valid_submission(group_size)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check_responds() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("ok"));
}

#[tokio::test]
async fn registering_without_a_published_form_is_not_found() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/register",
        None,
        Some(valid_submission(1)),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn admin_routes_require_a_session() {
    let app = test_app();

    let (status, _) = send(&app, Method::GET, "/api/admin/registrations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/registrations",
        Some("bogus-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/login",
        None,
        Some(json!({ "password": "nope" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], json!("AUTH_ERROR"));
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = test_app();
    let token = login(&app).await;

    let (status, _) = send(&app, Method::POST, "/api/admin/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/admin/registrations",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_submissions_fail_with_field_keyed_messages() {
    let app = test_app();
    let token = login(&app).await;
    publish_default_form(&app, &token).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/register",
        None,
        Some(json!({
            "name": "Ada Lovelace",
            "phone": "+44 20 7946 0123",
            "teamMembers": []
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("VALIDATION_ERROR"));
    assert!(body["error"]["details"]["email"].is_string());
    assert!(body["error"]["details"]["teamMembers"].is_string());
}

#[tokio::test]
async fn published_form_is_publicly_visible() {
    let app = test_app();
    let token = login(&app).await;

    let (status, _) = send(&app, Method::GET, "/api/form", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let form_id = publish_default_form(&app, &token).await;
    let (status, body) = send(&app, Method::GET, "/api/form", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"].as_i64().unwrap(), form_id);
    assert_eq!(body["data"]["isPublished"], json!(true));
}

#[tokio::test]
async fn publishing_another_form_leaves_exactly_one_published() {
    let app = test_app();
    let token = login(&app).await;

    let first = publish_default_form(&app, &token).await;
    let second = publish_default_form(&app, &token).await;
    assert_ne!(first, second);

    let (_, body) = send(&app, Method::GET, "/api/admin/forms", Some(&token), None).await;
    let published: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["isPublished"] == json!(true))
        .map(|f| f["id"].as_i64().unwrap())
        .collect();
    assert_eq!(published, vec![second]);
}

#[tokio::test]
async fn payment_fields_without_a_link_are_rejected_at_save() {
    let app = test_app();
    let token = login(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/forms",
        Some(&token),
        Some(json!({
            "title": "Paid event",
            "customFields": [
                { "id": "fee", "type": "payment", "paymentUrl": "", "label": "Entry fee", "required": true }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["fee"].is_string());
}

#[tokio::test]
async fn full_ticket_lifecycle_under_the_budgeted_policy() {
    let app = test_app();
    let token = login(&app).await;
    publish_default_form(&app, &token).await;

    let ticket_id = register(&app, 4).await;
    assert!(ticket_id.starts_with("REG"));

    // Scanning before issuance is denied but not an HTTP error.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/verify?t={ticket_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("QR code not generated"));

    // Issue the credential.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/admin/generate-qr/{ticket_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let qr_code = body["data"]["qrCode"].as_str().unwrap();
    assert!(qr_code.starts_with("data:image/png;base64,"));
    assert_eq!(
        body["data"]["verifyUrl"],
        json!(format!("https://tickets.example/verify?t={ticket_id}"))
    );
    assert_eq!(body["data"]["registration"]["status"], json!("active"));

    // Re-issuing without a revoke is a conflict.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/admin/generate-qr/{ticket_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("CONFLICT"));

    // First scan: 3 of 4 entries left.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/verify?t={ticket_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true));
    assert!(body["message"].as_str().unwrap().contains("3 entries remaining"));
    assert_eq!(body["registration"]["scans"], json!(1));

    // Spend the rest of the budget.
    for _ in 0..3 {
        let (_, body) = send(
            &app,
            Method::GET,
            &format!("/api/verify?t={ticket_id}"),
            None,
            None,
        )
        .await;
        assert_eq!(body["valid"], json!(true));
    }

    // Fifth scan is denied.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/verify?t={ticket_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("Maximum entries reached"));
    assert_eq!(body["registration"]["status"], json!("exhausted"));

    // The audit log kept the four granted entries.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/admin/registrations/{ticket_id}/history"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 4);

    // Revoke, then the ticket scans like an unissued one again.
    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/admin/revoke-qr/{ticket_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(body["data"]["scans"], json!(0));
    assert_eq!(body["data"]["qrCodeData"], Value::Null);

    // Delete cascades to history and leaves nothing behind.
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/registrations/{ticket_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/verify?t={ticket_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Invalid ticket ID. Registration not found."));
}

#[tokio::test]
async fn verifying_an_unknown_ticket_is_a_clean_denial() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/verify?t=DOES-NOT-EXIST", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(false));
    assert_eq!(body["message"], json!("Invalid ticket ID. Registration not found."));
    assert!(body.get("registration").is_none());
}

#[tokio::test]
async fn admin_edits_apply_partially_and_without_revalidation() {
    let app = test_app();
    let token = login(&app).await;
    publish_default_form(&app, &token).await;
    let ticket_id = register(&app, 2).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/registrations/{ticket_id}"),
        Some(&token),
        Some(json!({ "name": "Grace Hopper" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Grace Hopper"));
    // Untouched fields survive the patch.
    assert_eq!(body["data"]["email"], json!("ada@example.org"));

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/registrations/{ticket_id}"),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/admin/registrations/REG9999",
        Some(&token),
        Some(json!({ "name": "Nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_aggregate_a_forms_registrations() {
    let app = test_app();
    let token = login(&app).await;
    let form_id = publish_default_form(&app, &token).await;

    let first = register(&app, 2).await;
    register(&app, 3).await;

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/admin/generate-qr/{first}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    send(&app, Method::GET, &format!("/api/verify?t={first}"), None, None).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/admin/forms/{form_id}/stats"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalRegistrations"], json!(2));
    assert_eq!(body["data"]["qrIssued"], json!(1));
    assert_eq!(body["data"]["attended"], json!(1));
    assert_eq!(body["data"]["pending"], json!(1));
    assert_eq!(body["data"]["totalScans"], json!(1));
    assert_eq!(body["data"]["totalAttendees"], json!(5));
}

#[tokio::test]
async fn exports_download_with_the_right_content_type() {
    let app = test_app();
    let token = login(&app).await;
    let form_id = publish_default_form(&app, &token).await;
    let ticket_id = register(&app, 1).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/admin/forms/{form_id}/export?format=csv"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("registrations.csv"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(&ticket_id));

    // Formats without a writer are refused up front.
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/admin/forms/{form_id}/export?format=xlsx"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn one_shot_forms_check_in_exactly_once() {
    let app = test_app();
    let token = login(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/forms",
        Some(&token),
        Some(json!({ "title": "Gala night", "scanPolicy": "one-shot" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let form_id = body["data"]["id"].as_i64().unwrap();
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/admin/forms/{form_id}/publish"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Group of three, but a single check-in under the one-shot policy.
    let ticket_id = register(&app, 3).await;
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/admin/generate-qr/{ticket_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/verify?t={ticket_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(body["valid"], json!(true));
    assert_eq!(body["registration"]["status"], json!("checked-in"));
    assert_eq!(body["registration"]["maxScans"], json!(1));

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/verify?t={ticket_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(body["valid"], json!(false));
    assert!(body["message"].as_str().unwrap().contains("Already scanned"));

    // Repeat presentation is on the audit log as an invalid attempt.
    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/admin/registrations/{ticket_id}/history"),
        Some(&token),
        None,
    )
    .await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries.iter().filter(|e| e["valid"] == json!(true)).count(),
        1
    );
}
