#![allow(dead_code)]

use std::sync::Arc;

use aberturas_api::{
    auth::UserRole,
    build_router,
    config::AppConfig,
    db::{self, DbConfig},
    events::{self, EventSender},
    services::users::CreateUserInput,
    AppState,
};
use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "admin@aberturas.test";
pub const ADMIN_PASSWORD: &str = "admin-password-123";

/// Helper harness for spinning up the full router backed by an in-memory
/// SQLite database with a seeded administrator.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        // One connection keeps every query on the same in-memory database
        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, event_sender);
        state
            .services
            .users
            .create_user(CreateUserInput {
                name: "Admin".to_string(),
                email: ADMIN_EMAIL.to_string(),
                password: ADMIN_PASSWORD.to_string(),
                role: UserRole::Admin,
                branch_id: None,
                phone: None,
                avatar: None,
            })
            .await
            .expect("seed admin");

        let router = build_router(state.clone());
        let mut app = Self {
            router,
            state,
            token: String::new(),
            _event_task: event_task,
        };
        app.token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        app
    }

    /// Logs in through the API and returns the session token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login should succeed");
        let payload = response_json(response).await;
        payload["data"]["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    /// Creates a user with the given role and returns a session token for it.
    pub async fn token_for_role(&self, role: UserRole) -> String {
        let email = format!("{}@aberturas.test", Uuid::new_v4().simple());
        let password = "role-password-123";
        self.state
            .services
            .users
            .create_user(CreateUserInput {
                name: format!("{} user", role),
                email: email.clone(),
                password: password.to_string(),
                role,
                branch_id: None,
                phone: None,
                avatar: None,
            })
            .await
            .expect("seed user");
        self.login(&email, password).await
    }

    /// Access the bearer token for the default admin user.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    /// Sends a prepared request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests as the admin.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Authenticated request that must answer `expected`; returns the body.
    pub async fn expect(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request_authenticated(method.clone(), uri, body).await;
        let status = response.status();
        let payload = response_json(response).await;
        assert_eq!(status, expected, "{} {} answered {}", method, uri, payload);
        payload
    }

    pub async fn create_customer(&self, name: &str) -> Value {
        let payload = self
            .expect(
                Method::POST,
                "/api/v1/clientes",
                Some(json!({ "kind": "company", "name": name, "email": "compras@example.com" })),
                StatusCode::CREATED,
            )
            .await;
        payload["data"].clone()
    }

    pub async fn create_item(&self, sku: &str, kind: &str, min_stock: i64) -> Value {
        let payload = self
            .expect(
                Method::POST,
                "/api/v1/stock/items",
                Some(json!({
                    "sku": sku,
                    "name": format!("Item {}", sku),
                    "unit": "u",
                    "kind": kind,
                    "min_stock": min_stock,
                })),
                StatusCode::CREATED,
            )
            .await;
        payload["data"].clone()
    }

    pub async fn create_warehouse(&self, code: &str) -> Value {
        let payload = self
            .expect(
                Method::POST,
                "/api/v1/stock/warehouses",
                Some(json!({ "code": code, "name": format!("Depósito {}", code) })),
                StatusCode::CREATED,
            )
            .await;
        payload["data"].clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON; empty bodies read as `null`.
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).expect("json response")
}

/// Parses a decimal that may have been serialized as a string or number.
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal: {}", other),
    }
}
