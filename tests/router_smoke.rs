use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use ses_matching_backend::app::{create_app, AppState};
use ses_matching_backend::config::Settings;
use ses_matching_backend::supabase::InMemoryTables;

fn test_app() -> Router {
    let tables = InMemoryTables::new();
    tables.seed(
        "projects",
        vec![json!({"id": "p1", "title": "案件", "tenant_id": "t1", "is_active": true})],
    );
    let state = AppState::new(Settings::for_tests(), Arc::new(tables), reqwest::Client::new())
        .expect("state builds without network");
    create_app(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public_and_reports_tables() {
    let response = test_app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["services"]["tables"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let response = test_app()
        .oneshot(Request::get("/projects").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["message"], "Missing authorization token");
}

#[tokio::test]
async fn non_bearer_scheme_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::get("/engineers")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid authorization format");
}

#[tokio::test]
async fn malformed_jwt_is_rejected() {
    let response = test_app()
        .oneshot(
            Request::post("/mail/bulk-send")
                .header(header::AUTHORIZATION, "Bearer not-a-jwt")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"template_id":"t","row_ids":["r"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn caller_request_id_is_echoed() {
    let response = test_app()
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let response = test_app()
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
