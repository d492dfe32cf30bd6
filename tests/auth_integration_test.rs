//! Session flow and role gating through the full router.

mod common;

use aberturas_api::auth::UserRole;
use axum::http::{header, Method, StatusCode};
use common::{response_json, TestApp, ADMIN_EMAIL, ADMIN_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn login_sets_cookie_and_returns_profile() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie")
        .to_string();
    assert!(cookie.contains("HttpOnly"));

    let payload = response_json(response).await;
    assert_eq!(payload["success"], true);
    assert_eq!(payload["data"]["user"]["email"], ADMIN_EMAIL);
    assert_eq!(payload["data"]["user"]["role"], "admin");
    assert!(payload["data"]["user"].get("password_hash").is_none());
    assert!(payload["data"]["user"]["last_login_at"].is_string());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;

    for body in [
        json!({ "email": ADMIN_EMAIL, "password": "not-the-password" }),
        json!({ "email": "nobody@aberturas.test", "password": ADMIN_PASSWORD }),
    ] {
        let response = app
            .request(Method::POST, "/api/v1/auth/login", Some(body), None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let payload = response_json(response).await;
        assert_eq!(payload["success"], false);
    }
}

#[tokio::test]
async fn api_requires_a_session() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/clientes", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/clientes", None, Some("garbage"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/v1/clientes", None, Some(app.token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let app = TestApp::new().await;
    let cookie = format!("{}={}", app.state.config.session_cookie_name, app.token());
    let request = axum::http::Request::builder()
        .method(Method::GET)
        .uri("/api/v1/auth/session")
        .header(header::COOKIE, cookie)
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = response_json(response).await;
    assert_eq!(payload["data"]["email"], ADMIN_EMAIL);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let token = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;

    let response = app
        .request(Method::GET, "/api/v1/auth/session", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::POST, "/api/v1/auth/logout", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/auth/session", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Other sessions stay valid
    let response = app
        .request(Method::GET, "/api/v1/dashboard", None, Some(app.token()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn user_administration_is_admin_only() {
    let app = TestApp::new().await;
    let sales = app.token_for_role(UserRole::Sales).await;

    let response = app
        .request(Method::GET, "/api/v1/usuarios", None, Some(&sales))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json!({
        "name": "Nueva",
        "email": "nueva@aberturas.test",
        "password": "password-123",
        "role": "sales",
    });
    let response = app
        .request(Method::POST, "/api/v1/usuarios", Some(body.clone()), Some(&sales))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let created = app
        .expect(Method::POST, "/api/v1/usuarios", Some(body.clone()), StatusCode::CREATED)
        .await;
    assert_eq!(created["data"]["email"], "nueva@aberturas.test");

    // Same email again
    app.expect(Method::POST, "/api/v1/usuarios", Some(body), StatusCode::CONFLICT)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/sucursales",
            Some(json!({ "name": "Centro" })),
            Some(&sales),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn short_passwords_are_rejected() {
    let app = TestApp::new().await;
    app.expect(
        Method::POST,
        "/api/v1/usuarios",
        Some(json!({
            "name": "Corta",
            "email": "corta@aberturas.test",
            "password": "short",
            "role": "viewer",
        })),
        StatusCode::BAD_REQUEST,
    )
    .await;
}

#[tokio::test]
async fn viewers_cannot_write() {
    let app = TestApp::new().await;
    let viewer = app.token_for_role(UserRole::Viewer).await;

    let response = app
        .request(Method::GET, "/api/v1/clientes", None, Some(&viewer))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/v1/clientes",
            Some(json!({ "kind": "person", "name": "Ana" })),
            Some(&viewer),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Own profile stays editable
    let response = app
        .request(
            Method::PUT,
            "/api/v1/usuarios/me",
            Some(json!({ "phone": "+54 11 5555 0000" })),
            Some(&viewer),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = response_json(response).await;
    assert_eq!(payload["data"]["phone"], "+54 11 5555 0000");
}

#[tokio::test]
async fn password_change_requires_current_password() {
    let app = TestApp::new().await;

    app.expect(
        Method::PUT,
        "/api/v1/usuarios/me/password",
        Some(json!({ "current_password": "wrong-one", "new_password": "brand-new-pass" })),
        StatusCode::BAD_REQUEST,
    )
    .await;

    app.expect(
        Method::PUT,
        "/api/v1/usuarios/me/password",
        Some(json!({ "current_password": ADMIN_PASSWORD, "new_password": "brand-new-pass" })),
        StatusCode::OK,
    )
    .await;

    let token = app.login(ADMIN_EMAIL, "brand-new-pass").await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let payload = response_json(response).await;
    assert_eq!(payload["data"]["status"], "up");
    assert_eq!(payload["data"]["database"], "up");
}
