//! API integration tests

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use circulation_server::{
    api,
    config::AppConfig,
    repository::{memory::MemoryStore, seed::SeedData, Repository},
    services::Services,
    AppState,
};

const EMAIL: &str = "desk@library.test";
const PASSWORD: &str = "open sesame";

/// Router over a freshly seeded in-memory library
async fn app() -> Router {
    let config = AppConfig::default();
    let repository = Repository::new(Arc::new(MemoryStore::new()));
    let services = Services::new(repository, &config);

    let seed: SeedData = serde_json::from_value(json!({
        "books": [
            {"book_id": "B001", "book_details": {"book_name": "The Hobbit"}, "is_book_available": true},
            {"book_id": "B002", "book_details": {"book_name": "Dune"}, "is_book_available": true}
        ],
        "students": [
            {"student_id": "S001", "student_details": {"student_name": "Ada Lovelace"}, "number_of_books_issued": 0},
            {"student_id": "S002", "student_details": {"student_name": "Alan Turing"}, "number_of_books_issued": 3}
        ],
        "librarians": [
            {"email": EMAIL, "password": PASSWORD, "name": "Front Desk"}
        ]
    }))
    .expect("valid seed");
    services.apply_seed(seed).await.expect("seed applied");

    api::router(AppState::new(config, services))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("valid request");

    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
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
        "/api/v1/auth/login",
        None,
        Some(json!({"email": EMAIL, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().expect("No token in response").to_string()
}

async fn submit(app: &Router, token: &str, book_id: &str, student_id: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/v1/transactions",
        Some(token),
        Some(json!({"book_id": book_id, "student_id": student_id})),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_login() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"email": EMAIL, "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["name"], "Front Desk");
}

#[tokio::test]
async fn test_login_invalid_credentials() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"email": EMAIL, "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"email": "not-an-email", "password": PASSWORD})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transactions_require_token() {
    let app = app().await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/transactions",
        None,
        Some(json!({"book_id": "B001", "student_id": "S001"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/v1/transactions", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_issue_then_wrong_student_return_then_return() {
    let app = app().await;
    let token = login(&app).await;

    let (status, body) = submit(&app, &token, "B001", "S001").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction_type"], "issue");
    assert_eq!(body["book_name"], "The Hobbit");
    assert_eq!(body["student_name"], "Ada Lovelace");
    assert_eq!(body["message"], "Book issued to the student!");

    let (status, body) = submit(&app, &token, "B001", "S002").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "ReturnMismatch");
    assert_eq!(body["message"], "The book wasn't issued by this student!");
    assert_eq!(body["retryable"], false);

    let (status, body) = submit(&app, &token, " B001 ", "S001").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["transaction_type"], "return");
    assert_eq!(body["message"], "Book returned to the library!");
}

#[tokio::test]
async fn test_refusals() {
    let app = app().await;
    let token = login(&app).await;

    let (status, body) = submit(&app, &token, "B002", "S002").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "IssueQuotaExceeded");

    let (status, body) = submit(&app, &token, "B404", "S001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UnknownBook");
    assert_eq!(body["message"], "The book doesn't exist in the library database!");

    let (status, body) = submit(&app, &token, "B001", "S404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UnknownStudent");

    let (status, _) = submit(&app, &token, "", "S001").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing above may have been recorded
    let (status, body) = send(&app, Method::GET, "/api/v1/transactions", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn test_search_history() {
    let app = app().await;
    let token = login(&app).await;

    for (book, student) in [("B001", "S001"), ("B002", "S001"), ("B001", "S001")] {
        let (status, _) = submit(&app, &token, book, student).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, Method::GET, "/api/v1/transactions?q=b001", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<_> = body["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|t| t["transaction_type"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(kinds, vec!["issue", "return"]);

    let (_, body) = send(&app, Method::GET, "/api/v1/transactions?q=S001&limit=2", Some(&token), None).await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    let cursor = body["next_cursor"].as_str().expect("cursor on a full page").to_string();

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/transactions?q=S001&limit=2&after={}", cursor),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert!(body["next_cursor"].is_null());

    let (_, body) = send(&app, Method::GET, "/api/v1/transactions?q=X1", Some(&token), None).await;
    assert_eq!(body["items"], json!([]));
}

#[tokio::test]
async fn test_scanned_identifiers() {
    let app = app().await;
    let token = login(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/transactions",
        Some(&token),
        Some(json!({
            "book_id": "B002\n",
            "student_id": "S001",
            "book_source": "scan",
            "student_source": "manual"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["book_id"], "B002");
    assert_eq!(body["transaction_type"], "issue");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/transactions",
        Some(&token),
        Some(json!({"book_id": "B001", "student_id": "S001", "book_source": "camera"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
