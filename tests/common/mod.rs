#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use elearning_service::auth::jwt::JwtManager;
use elearning_service::config::Config;
use elearning_service::routes::create_router;
use elearning_service::AppState;
use http_body_util::BodyExt;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const ACCESS_SECRET: &str = "test-access-secret";
pub const REFRESH_SECRET: &str = "test-refresh-secret";
pub const PASSWORD: &str = "secret1";

// ─── TestResponse ────────────────────────────────────────────────────────────

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: Vec<u8>,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body_bytes).unwrap_or_else(|e| {
            panic!(
                "Failed to deserialize response as {}: {e}\nBody: {}",
                std::any::type_name::<T>(),
                self.text()
            )
        })
    }

    pub fn value(&self) -> Value {
        self.json()
    }

    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status, expected,
            "Expected status {expected}, got {}. Body: {}",
            self.status,
            self.text()
        );
    }
}

// ─── TestUser ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
    pub refresh_token: String,
}

// ─── TestApp ─────────────────────────────────────────────────────────────────

pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            // One connection keeps every query on the same in-memory database.
            database_max_connections: 1,
            jwt_access_secret: ACCESS_SECRET.to_string(),
            jwt_refresh_secret: REFRESH_SECRET.to_string(),
            jwt_issuer: "elearning-test".to_string(),
            jwt_access_token_expiry_secs: 3600,
            jwt_refresh_token_expiry_days: 7,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origins: "*".to_string(),
            request_timeout_secs: 30,
            log_format: "text".to_string(),
        };

        let db = elearning_service::db::pool::connect(&config)
            .await
            .expect("Failed to connect to in-memory SQLite");

        elearning_service::db::migration::run(&db)
            .await
            .expect("Failed to run migrations");

        let jwt = JwtManager::new(&config).expect("Failed to init JwtManager");

        let state = AppState { db, jwt, config };
        let router = create_router(state.clone());

        Self { router, state }
    }

    pub async fn request(&self, req: Request<Body>) -> TestResponse {
        let resp = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot failed");

        let status = resp.status();
        let body_bytes = resp
            .into_body()
            .collect()
            .await
            .expect("failed to read body")
            .to_bytes()
            .to_vec();

        TestResponse { status, body_bytes }
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.request(req).await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send("POST", uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send("PUT", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send("DELETE", uri, token, None).await
    }

    // ── Auth helpers ─────────────────────────────────────────────────────

    pub async fn register(&self, email: &str, password: &str, role: Option<&str>) -> TestResponse {
        let mut body = json!({
            "email": email,
            "password": password,
            "name": email.split('@').next().unwrap_or("user"),
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        self.post("/users/register", None, body).await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post(
            "/users/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Registers with the given role and logs in.
    pub async fn signup(&self, email: &str, role: &str) -> TestUser {
        self.register(email, PASSWORD, Some(role))
            .await
            .assert_status(StatusCode::CREATED);

        let resp = self.login(email, PASSWORD).await;
        resp.assert_status(StatusCode::OK);
        let json = resp.value();

        TestUser {
            id: json["user"]["id"].as_str().unwrap().to_string(),
            email: email.to_string(),
            token: json["token"].as_str().unwrap().to_string(),
            refresh_token: json["refreshToken"].as_str().unwrap().to_string(),
        }
    }

    // ── Catalog helpers ──────────────────────────────────────────────────

    pub async fn create_course(&self, owner: &TestUser, title: &str, category: &str, price: f64) -> String {
        let resp = self
            .post(
                "/courses",
                Some(&owner.token),
                json!({
                    "title": title,
                    "description": format!("{title} description"),
                    "category": category,
                    "price": price,
                }),
            )
            .await;
        resp.assert_status(StatusCode::CREATED);
        resp.value()["id"].as_str().unwrap().to_string()
    }

    pub async fn create_video(&self, owner: &TestUser, course_id: &str, title: &str) -> String {
        let resp = self
            .post(
                "/videos",
                Some(&owner.token),
                json!({
                    "title": title,
                    "link": format!("https://videos.test/{title}"),
                    "courseId": course_id,
                }),
            )
            .await;
        resp.assert_status(StatusCode::CREATED);
        resp.value()["id"].as_str().unwrap().to_string()
    }

    pub async fn enroll(&self, student: &TestUser, course_id: &str) -> TestResponse {
        self.post(
            &format!("/courses/{course_id}/enroll"),
            Some(&student.token),
            json!({}),
        )
        .await
    }

    pub async fn mark_watched(&self, student: &TestUser, video_id: &str) -> TestResponse {
        self.post(
            &format!("/videos/{video_id}/watched"),
            Some(&student.token),
            json!({}),
        )
        .await
    }

    // ── Store helpers ────────────────────────────────────────────────────

    /// Row count read straight from the store.
    pub async fn count<E>(&self, _entity: E) -> u64
    where
        E: EntityTrait,
        E::Model: Sync,
    {
        E::find().count(&self.state.db).await.unwrap()
    }
}
