//! Bearer credential handling on protected routes.

use axum::http::StatusCode;
use reqwest::Method;
use serde_json::json;

use crate::auth::TOKEN_TTL_SECS;
use crate::e2e_tests::helpers::*;
use crate::store::UserId;
use crate::testing::random_authority;

const PROTECTED: &[(&str, &str)] = &[
    ("GET", "/auth/profile"),
    ("GET", "/configs"),
    ("POST", "/configs"),
    ("GET", "/configs/active"),
    ("GET", "/configs/00000000-0000-0000-0000-000000000000"),
    ("POST", "/configs/00000000-0000-0000-0000-000000000000/activate"),
    ("GET", "/jobs"),
    ("GET", "/jobs/stats"),
    ("GET", "/batches"),
    ("GET", "/batches/b-1/jobs"),
    ("POST", "/submit/job"),
];

async fn raw_status(
    server: &TestServer,
    method: &str,
    path: &str,
    header: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let method = Method::from_bytes(method.as_bytes()).expect("method");
    let mut request = server.client.request(method, server.url(path));
    if let Some(header) = header {
        request = request.header("authorization", header);
    }
    let response = request.send().await.expect("send");
    let status = response.status();
    (status, response.json().await.unwrap_or(serde_json::Value::Null))
}

#[tokio::test]
async fn test_missing_header() {
    let server = TestServer::start().await;
    for (method, path) in PROTECTED {
        for header in [None, Some("")] {
            let (status, body) = raw_status(&server, method, path, header).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {path} {header:?}");
            assert_eq!(
                body,
                json!({"success": false, "error": "Authorization header required"})
            );
        }
    }
}

#[tokio::test]
async fn test_wrong_scheme() {
    let server = TestServer::start().await;
    let token = server.token_for(UserId::new_random());

    for header in [
        format!("Token {token}"),
        format!("bearer {token}"),
        token.clone(),
        "Bearer".to_string(),
    ] {
        let (status, body) = raw_status(&server, "GET", "/configs", Some(&header)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body["error"],
            json!("Invalid authorization format. Use: Bearer <token>")
        );
    }
}

#[tokio::test]
async fn test_expired_token() {
    let server = TestServer::start().await;
    let now = jsonwebtoken::get_current_timestamp();
    let expired = server
        .tokens
        .issue_at(UserId::new_random(), "old@example.com", now - TOKEN_TTL_SECS - 10)
        .expect("issue")
        .token;

    let (status, body) = server.get("/configs", &expired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid or expired token"));
}

#[tokio::test]
async fn test_token_from_other_key() {
    let server = TestServer::start().await;
    let foreign = random_authority()
        .issue(UserId::new_random(), "x@example.com")
        .expect("issue")
        .token;

    let (status, body) = server.get("/configs", &foreign).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid or expired token"));
}

#[tokio::test]
async fn test_valid_token_for_unknown_subject_sees_empty_data() {
    let server = TestServer::start().await;
    let token = server.token_for(UserId::new_random());

    let (status, body) = server.get("/configs", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}
