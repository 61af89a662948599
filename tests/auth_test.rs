mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{TestApp, ACCESS_SECRET, PASSWORD};
use elearning_service::auth::jwt::{Claims, TokenKind};
use entity::user::Role;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use serial_test::serial;

fn email_only_token(email: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: None,
        email: Some(email.to_string()),
        name: String::new(),
        role: Role::User,
        iss: "elearning-test".to_string(),
        exp: now + 600,
        iat: now,
        jti: uuid::Uuid::new_v4().to_string(),
        typ: TokenKind::Access,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
    )
    .unwrap()
}

// ─── Register / Login ────────────────────────────────────────────────────────

#[serial]
#[tokio::test]
async fn test_register_login_and_duplicate() {
    let app = TestApp::new().await;

    let resp = app.register("a@b.com", PASSWORD, None).await;
    resp.assert_status(StatusCode::CREATED);
    let json = resp.value();
    assert_eq!(json["user"]["email"], "a@b.com");
    assert_eq!(json["user"]["role"], "USER");
    assert!(json["user"].get("passwordHash").is_none());
    assert!(json["user"].get("password_hash").is_none());

    let resp = app.login("a@b.com", PASSWORD).await;
    resp.assert_status(StatusCode::OK);
    let json = resp.value();
    let token = json["token"].as_str().unwrap();
    assert!(json["refreshToken"].as_str().is_some());

    let claims = app.state.jwt.verify(token, TokenKind::Access).unwrap();
    assert_eq!(claims.role, Role::User);
    assert_eq!(claims.sub.as_deref(), json["user"]["id"].as_str());

    let resp = app.register("A@B.com", "another1", None).await;
    resp.assert_status(StatusCode::CONFLICT);
    assert_eq!(resp.value()["error"], "user_already_exists");
    assert_eq!(app.count(entity::user::Entity).await, 1);
}

#[serial]
#[tokio::test]
async fn test_register_validation() {
    let app = TestApp::new().await;

    let resp = app
        .post("/users/register", None, json!({ "email": "x@y.com", "name": "X" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    app.register("x@y.com", "123", None)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.register("not-an-email", PASSWORD, None)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.register("x@y.com", PASSWORD, Some("SUPERUSER"))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let resp = app
        .post(
            "/users/register",
            None,
            json!({ "email": "x@y.com", "password": PASSWORD, "name": "X", "age": -1 }),
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = app
        .post(
            "/users/register",
            None,
            json!({ "email": "x@y.com", "password": PASSWORD, "name": "X", "age": "ten" }),
        )
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.value()["error"], "bad_request");

    assert_eq!(app.count(entity::user::Entity).await, 0);
}

#[serial]
#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::new().await;
    app.register("a@b.com", PASSWORD, None).await;

    let resp = app.login("a@b.com", "wrong-password").await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.value()["error"], "invalid_credentials");

    let resp = app.login("nobody@b.com", PASSWORD).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.value()["error"], "invalid_credentials");

    app.post("/users/login", None, json!({ "email": "a@b.com" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[serial]
#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = TestApp::new().await;
    app.register("a@b.com", PASSWORD, None).await;

    // Registration above used one slot of the window.
    for _ in 0..19 {
        app.login("a@b.com", "wrong-password")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    let resp = app.login("a@b.com", PASSWORD).await;
    resp.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.value()["error"], "rate_limited");
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[serial]
#[tokio::test]
async fn test_regenerate_token() {
    let app = TestApp::new().await;
    let user = app.signup("a@b.com", "USER").await;

    let resp = app.get("/regenerateToken", Some(&user.refresh_token)).await;
    resp.assert_status(StatusCode::CREATED);
    let token = resp.value()["token"].as_str().unwrap().to_string();

    let resp = app.get("/users/profile", Some(&token)).await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["email"], "a@b.com");

    // An access token is not a refresh token.
    let resp = app.get("/regenerateToken", Some(&user.token)).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(resp.value()["error"], "invalid_refresh_token");

    app.get("/regenerateToken", None)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[serial]
#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = TestApp::new().await;
    let user = app.signup("a@b.com", "USER").await;

    let resp = app.get("/users/profile", Some(&user.refresh_token)).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.value()["error"], "invalid_token");
}

#[serial]
#[tokio::test]
async fn test_logout_revokes_tokens() {
    let app = TestApp::new().await;
    let user = app.signup("a@b.com", "USER").await;

    let resp = app
        .post(
            "/users/logout",
            Some(&user.token),
            json!({ "refreshToken": user.refresh_token }),
        )
        .await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["message"], "Logged out successfully");

    let resp = app.get("/users/profile", Some(&user.token)).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.value()["error"], "token_revoked");

    app.get("/regenerateToken", Some(&user.refresh_token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // A fresh login still works.
    let resp = app.login("a@b.com", PASSWORD).await;
    resp.assert_status(StatusCode::OK);
    let token = resp.value()["token"].as_str().unwrap().to_string();
    app.get("/users/profile", Some(&token))
        .await
        .assert_status(StatusCode::OK);
}

#[serial]
#[tokio::test]
async fn test_logout_without_body_revokes_access_token_only() {
    let app = TestApp::new().await;
    let user = app.signup("a@b.com", "USER").await;

    let req = Request::builder()
        .method("POST")
        .uri("/users/logout")
        .header("Authorization", format!("Bearer {}", user.token))
        .body(Body::empty())
        .unwrap();
    app.request(req).await.assert_status(StatusCode::OK);

    app.get("/users/profile", Some(&user.token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.get("/regenerateToken", Some(&user.refresh_token))
        .await
        .assert_status(StatusCode::CREATED);
}

// ─── Identity resolution ─────────────────────────────────────────────────────

#[serial]
#[tokio::test]
async fn test_missing_or_garbage_token_is_401() {
    let app = TestApp::new().await;

    let resp = app.get("/users/profile", None).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.value()["error"], "unauthorized");

    let resp = app.get("/users/profile", Some("not.a.jwt")).await;
    resp.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(resp.value()["message"], "Invalid or expired token");
}

#[serial]
#[tokio::test]
async fn test_valid_token_for_deleted_user_is_404() {
    let app = TestApp::new().await;
    let admin = app.signup("admin@b.com", "ADMIN").await;
    let user = app.signup("gone@b.com", "USER").await;

    app.delete(&format!("/users/{}", user.id), Some(&admin.token))
        .await
        .assert_status(StatusCode::OK);

    let resp = app.get("/users/profile", Some(&user.token)).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(resp.value()["error"], "user_not_found");
}

#[serial]
#[tokio::test]
async fn test_email_only_token_resolves_user() {
    let app = TestApp::new().await;
    app.register("legacy@b.com", PASSWORD, None).await;

    let resp = app
        .get("/users/profile", Some(&email_only_token("legacy@b.com")))
        .await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["email"], "legacy@b.com");

    app.get("/users/profile", Some(&email_only_token("missing@b.com")))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[serial]
#[tokio::test]
async fn test_role_is_read_from_store_not_token() {
    let app = TestApp::new().await;
    let admin = app.signup("admin@b.com", "ADMIN").await;
    let user = app.signup("u@b.com", "USER").await;

    app.post("/courses", Some(&user.token), json!({ "title": "Nope" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.put(
        &format!("/users/{}", user.id),
        Some(&admin.token),
        json!({ "role": "TEACHER" }),
    )
    .await
    .assert_status(StatusCode::OK);

    // Same token, new role.
    app.post("/courses", Some(&user.token), json!({ "title": "Now allowed" }))
        .await
        .assert_status(StatusCode::CREATED);
}

#[serial]
#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let resp = app.get("/health", None).await;
    resp.assert_status(StatusCode::OK);
    assert_eq!(resp.value()["ok"], true);
}
