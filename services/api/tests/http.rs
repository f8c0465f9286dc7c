//! End-to-end tests of the HTTP surface over the in-memory store

use api::{AppState, create_router, middleware::{Claims, JwtConfig, TokenType}};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use classroom::{Classroom, EventBus, MemoryStore};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &[u8] = b"test-secret";

fn app() -> Router {
    let classroom = Classroom::new(Arc::new(MemoryStore::new()), EventBus::new(64));
    create_router(AppState::new(classroom, JwtConfig::hs256(SECRET)))
}

fn token_with(sub: Uuid, role: &str, token_type: TokenType) -> String {
    let now = Utc::now().timestamp() as u64;
    let claims = Claims {
        sub,
        roles: vec![role.to_string()],
        iat: now,
        exp: now + 3600,
        token_type,
        tutor_approved: false,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn token(sub: Uuid, role: &str) -> String {
    token_with(sub, role, TokenType::Access)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
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
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

struct Marketplace {
    app: Router,
    admin: String,
    tutor_id: Uuid,
    tutor: String,
}

impl Marketplace {
    async fn new() -> Self {
        let app = app();
        let admin = token(Uuid::new_v4(), "admin");
        let tutor_id = Uuid::new_v4();
        let (status, body) = send(
            &app,
            "POST",
            &format!("/tutors/{}/approve", tutor_id),
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");

        Self {
            app,
            admin,
            tutor_id,
            tutor: token(tutor_id, "tutor"),
        }
    }

    async fn class(&self, capacity: i32) -> Uuid {
        let (status, body) = send(
            &self.app,
            "POST",
            "/classes",
            Some(&self.tutor),
            Some(json!({
                "subject": "Physics",
                "grade": "Form 4",
                "fee": 2500,
                "capacity_seats": capacity,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "draft");
        assert_eq!(body["tutor_id"], self.tutor_id.to_string());
        body["id"].as_str().unwrap().parse().unwrap()
    }

    async fn schedule(&self, class_id: Uuid, start: &str, end: &str) -> (StatusCode, Value) {
        send(
            &self.app,
            "POST",
            &format!("/classes/{}/sessions", class_id),
            Some(&self.tutor),
            Some(json!({ "start_time": start, "end_time": end })),
        )
        .await
    }

    async fn publish(&self, class_id: Uuid) -> (StatusCode, Value) {
        send(
            &self.app,
            "POST",
            &format!("/classes/{}/publish", class_id),
            Some(&self.tutor),
            None,
        )
        .await
    }
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(&app(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], true);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (status, body) = send(&app(), "POST", "/admin/roll-forward", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");
}

#[tokio::test]
async fn test_refresh_token_is_rejected() {
    let refresh = token_with(Uuid::new_v4(), "admin", TokenType::Refresh);
    let (status, _) = send(&app(), "POST", "/admin/roll-forward", Some(&refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    let now = Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: Uuid::new_v4(),
        roles: vec!["admin".to_string()],
        iat: now,
        exp: now + 3600,
        token_type: TokenType::Access,
        tutor_approved: true,
    };
    let forged = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"other")).unwrap();
    let (status, _) = send(&app(), "POST", "/admin/roll-forward", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_enroll_and_pay_flow() {
    let market = Marketplace::new().await;
    let class_id = market.class(1).await;

    let (status, body) = market
        .schedule(class_id, "2026-06-01T10:00:00Z", "2026-06-01T11:00:00Z")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, body) = market.publish(class_id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "published");

    let student_id = Uuid::new_v4();
    let student = token(student_id, "student");
    let (status, body) = send(
        &market.app,
        "POST",
        &format!("/classes/{}/enroll", class_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    let enrollment_id = body["enrollment_id"].as_str().unwrap().to_string();
    let invoice_id = body["invoice_id"].as_str().unwrap().to_string();

    let latecomer = token(Uuid::new_v4(), "student");
    let (status, body) = send(
        &market.app,
        "POST",
        &format!("/classes/{}/enroll", class_id),
        Some(&latecomer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "resource_exhausted");
    assert_eq!(body["error"], "No seats available");

    let (status, body) = send(
        &market.app,
        "POST",
        &format!("/invoices/{}/payments", invoice_id),
        Some(&student),
        Some(json!({ "proof_url": "https://files.example/receipt.png" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let payment_id = body["payment_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &market.app,
        "GET",
        &format!("/enrollments/{}/payment-status", enrollment_id),
        Some(&market.tutor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "under_review");

    let (status, body) = send(
        &market.app,
        "POST",
        &format!("/payments/{}/review", payment_id),
        Some(&market.admin),
        Some(json!({ "approve": false, "reason": "blurry" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");

    let (status, body) = send(
        &market.app,
        "GET",
        &format!("/enrollments/{}/payment-status", enrollment_id),
        Some(&market.tutor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rejected");

    let (status, body) = send(
        &market.app,
        "POST",
        &format!("/enrollments/{}/unenroll", enrollment_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn test_clashing_session_is_precondition_failed() {
    let market = Marketplace::new().await;
    let first = market.class(5).await;
    let second = market.class(5).await;

    let (status, _) = market
        .schedule(first, "2026-06-01T10:00:00Z", "2026-06-01T11:00:00Z")
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = market
        .schedule(second, "2026-06-01T10:30:00Z", "2026-06-01T11:30:00Z")
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["code"], "failed_precondition");
    assert_eq!(body["error"], "Session time clash detected");
}

#[tokio::test]
async fn test_student_cannot_publish() {
    let market = Marketplace::new().await;
    let class_id = market.class(5).await;
    let student = token(Uuid::new_v4(), "student");

    let (status, body) = send(
        &market.app,
        "POST",
        &format!("/classes/{}/publish", class_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let market = Marketplace::new().await;
    let (status, body) = send(
        &market.app,
        "POST",
        "/classes",
        Some(&market.tutor),
        Some(json!({ "subject": 12 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_argument");
}

#[tokio::test]
async fn test_unknown_class_is_not_found() {
    let market = Marketplace::new().await;
    let (status, body) = market.publish(Uuid::new_v4()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Class not found");
}

#[tokio::test]
async fn test_roll_forward_requires_admin() {
    let market = Marketplace::new().await;
    let (status, _) = send(
        &market.app,
        "POST",
        "/admin/roll-forward",
        Some(&market.tutor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &market.app,
        "POST",
        "/admin/roll-forward",
        Some(&market.admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], 0);
}

#[tokio::test]
async fn test_token_with_extra_claims_is_accepted() {
    let now = Utc::now().timestamp() as u64;
    let claims = json!({
        "sub": Uuid::new_v4(),
        "roles": ["admin"],
        "permissions": ["payments:review"],
        "iat": now,
        "exp": now + 3600,
        "token_type": "Access",
    });
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap();

    let (status, body) = send(&app(), "POST", "/admin/roll-forward", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["created"], 0);
}
