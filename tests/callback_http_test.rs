//! HTTP contract of the payment endpoints.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use pointe::checkout::{
    CheckoutStore, InMemoryCheckoutStore, PendingCheckout, ReconciliationEngine,
};
use pointe::ledger::{InMemoryLedgerStore, LedgerManager, ProductKind};
use pointe::testing::InMemoryUserDirectory;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> (Router, InMemoryCheckoutStore, InMemoryUserDirectory) {
    let checkouts = InMemoryCheckoutStore::new();
    let users = InMemoryUserDirectory::new();
    let engine = Arc::new(ReconciliationEngine::new(
        checkouts.clone(),
        LedgerManager::new(InMemoryLedgerStore::new(), users.clone()),
    ));
    (pointe::http::payment_routes(engine), checkouts, users)
}

async fn seed_pending(checkouts: &InMemoryCheckoutStore, reference: &str) {
    let now = Utc::now();
    checkouts
        .put(&PendingCheckout {
            reference: reference.to_string(),
            user_id: "u1".to_string(),
            product_id: "p1".to_string(),
            kind: ProductKind::PunchCard,
            recurring: false,
            amount_cents: 20_000,
            monthly_entries: None,
            total_entries: Some(10),
            gateway_session_id: "gs_1".to_string(),
            created_at: now,
            expires_at: now + Duration::hours(1),
        })
        .await
        .unwrap();
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn callback_returns_success_and_transaction_id() {
    let (app, checkouts, users) = app().await;
    users.add_user("u1");
    seed_pending(&checkouts, "u1-p1-1000").await;

    let response = app
        .oneshot(post_json(
            "/payment/callback",
            json!({
                "unique_id": "u1-p1-1000",
                "reference_number": "gw-1",
                "amount": 200.0,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert!(body["transaction_id"].is_string());
}

#[tokio::test]
async fn unresolvable_callback_returns_400_with_error() {
    let (app, _, _) = app().await;

    let response = app
        .oneshot(post_json(
            "/payment/callback",
            json!({
                "unique_id": "garbage",
                "reference_number": "gw-1",
                "amount": 200.0,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn failure_callback_always_succeeds() {
    let (app, checkouts, _) = app().await;
    seed_pending(&checkouts, "u1-p1-1000").await;

    let response = app
        .oneshot(post_json(
            "/payment/callback/failure",
            json!({ "unique_id": "u1-p1-1000" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(checkouts.get("u1-p1-1000").await.unwrap().is_none());
}

#[tokio::test]
async fn status_endpoint_reports_pending_then_unknown() {
    let (app, checkouts, _) = app().await;
    seed_pending(&checkouts, "u1-p1-1000").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/payment/status/u1-p1-1000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], json!("pending"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/payment/status/u9-p9-9000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await["status"], json!("unknown"));
}

#[tokio::test]
async fn camel_case_gateway_fields_are_accepted() {
    let (app, checkouts, users) = app().await;
    users.add_user("u1");
    seed_pending(&checkouts, "u1-p1-1000").await;

    let response = app
        .oneshot(post_json(
            "/payment/callback",
            json!({
                "uniqueId": "u1-p1-1000",
                "referenceNumber": "gw-1",
                "amount": 200.0,
                "cardSuffix": "4242",
                "cardBrand": "visa",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
