//! Aberturas API Library
//!
//! CRM and light ERP back end for a window and door manufacturer: customers,
//! the sales-quote pipeline, project fulfillment, stock with BOM-based
//! production, tasks and user administration.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod media;
pub mod migrator;
pub mod models;
pub mod services;
pub mod tracing;

use axum::{extract::DefaultBodyLimit, response::Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires the auth service and every domain service over one pool.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let auth = Arc::new(AuthService::new((&config).into(), db.clone()));
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    pub meta: ResponseMeta,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            errors: None,
            meta: ResponseMeta::capture(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            errors: None,
            meta: ResponseMeta::capture(),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: ResponseMeta::capture(),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Everything under `/api/v1`. Resource routes require a session; the
/// session endpoints under `/auth` manage their own gating.
pub fn api_v1_routes(auth: Arc<AuthService>) -> Router<AppState> {
    Router::new()
        .merge(handlers::dashboard::dashboard_routes())
        .merge(handlers::users::user_routes())
        .merge(handlers::branches::branch_routes())
        .merge(handlers::customers::customer_routes())
        .merge(handlers::suppliers::supplier_routes())
        .merge(handlers::quotes::quote_routes())
        .merge(handlers::projects::project_routes())
        .merge(handlers::tasks::task_routes())
        .merge(handlers::stock::stock_routes())
        .with_auth(auth.clone())
        .nest("/auth", auth::auth_routes(auth))
}

/// Full application router with request-id scoping and HTTP tracing.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_size;
    Router::new()
        .merge(handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes(state.auth.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(crate::tracing::request_id_middleware))
        .with_state(state)
}
