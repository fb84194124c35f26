//! Registration, login, and profile.

use axum::http::StatusCode;
use reqwest::Method;
use serde_json::json;

use crate::e2e_tests::helpers::*;
use crate::store::{NewUser, Store};

#[tokio::test]
async fn test_register_then_profile() {
    let server = TestServer::start().await;
    let (token, user_id) = server.register("Alice", "alice@example.com").await;

    let (status, body) = server.get("/auth/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Profile retrieved"));
    assert_eq!(body["data"]["user_id"], json!(user_id.to_string()));
    assert_eq!(body["data"]["name"], json!("Alice"));
    assert_eq!(body["data"]["email"], json!("alice@example.com"));
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_duplicate_email_conflicts() {
    let server = TestServer::start().await;
    server.register("Alice", "alice@example.com").await;

    let (status, body) = server
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({"name": "Other", "email": "alice@example.com", "password": "secret-pw"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({"success": false, "error": "Email already registered"}));
}

#[tokio::test]
async fn test_register_validation() {
    let server = TestServer::start().await;

    let cases = [
        (
            json!({"name": "", "email": "a@example.com", "password": "secret-pw"}),
            "Name, email, and password are required",
        ),
        (
            json!({"email": "a@example.com", "password": "secret-pw"}),
            "Name, email, and password are required",
        ),
        (
            json!({"name": "A", "email": "a@example.com", "password": "12345"}),
            "Password must be at least 6 characters",
        ),
    ];
    for (payload, message) in cases {
        let (status, body) = server
            .send(Method::POST, "/auth/register", None, Some(payload))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!(message));
    }
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let server = TestServer::start().await;
    let response = server
        .client
        .post(server.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("send");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("json");
    assert_eq!(body["error"], json!("Invalid request body"));
}

#[tokio::test]
async fn test_login() {
    let server = TestServer::start().await;
    let (_, user_id) = server.register("Alice", "alice@example.com").await;

    let (status, body) = server
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "alice@example.com", "password": "secret-pw"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Login successful"));
    assert_eq!(body["data"]["user"]["user_id"], json!(user_id.to_string()));

    let token = body["data"]["token"].as_str().expect("token");
    let (status, _) = server.get("/auth/profile", token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_failures_look_alike() {
    let server = TestServer::start().await;
    server.register("Alice", "alice@example.com").await;

    for payload in [
        json!({"email": "alice@example.com", "password": "wrong-pw"}),
        json!({"email": "nobody@example.com", "password": "secret-pw"}),
    ] {
        let (status, body) = server
            .send(Method::POST, "/auth/login", None, Some(payload))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], json!("Invalid email or password"));
    }
}

#[tokio::test]
async fn test_federated_account_cannot_use_password() {
    let server = TestServer::start().await;
    server
        .store
        .create_user(&NewUser {
            name: "Gina".to_string(),
            email: Some("gina@example.com".to_string()),
            password_hash: None,
            google_id: Some("google-123".to_string()),
        })
        .await
        .expect("create user");

    let (status, body) = server
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "gina@example.com", "password": "anything"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("This account uses Google login"));
}

#[tokio::test]
async fn test_profile_for_vanished_user() {
    let server = TestServer::start().await;
    let token = server.token_for(crate::store::UserId::new_random());

    let (status, body) = server.get("/auth/profile", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("User not found"));
}

#[tokio::test]
async fn test_google_endpoints_not_implemented() {
    let server = TestServer::start().await;

    let (status, body) = server.send(Method::GET, "/auth/google", None, None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(
        body["error"],
        json!("Google OAuth not configured. Please set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET")
    );

    let (status, _) = server
        .send(Method::GET, "/auth/google/callback", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}
