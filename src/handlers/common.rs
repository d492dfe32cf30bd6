use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::services::PageRequest;
use crate::ApiResponse;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// 200 for a replayed idempotent request, 201 for a fresh one.
pub fn replayable_response<T: Serialize>(data: T, replayed: bool) -> Response {
    if replayed {
        success_response(data)
    } else {
        created_response(data)
    }
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Applies the configured default and ceiling for page sizes.
    pub fn to_request(&self, config: &AppConfig) -> PageRequest {
        let per_page = self
            .per_page
            .unwrap_or(config.api_default_page_size)
            .min(config.api_max_page_size);
        PageRequest::new(self.page.unwrap_or(1), per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "secret".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn page_size_is_capped() {
        let cfg = config();
        let params = PaginationParams {
            page: Some(3),
            per_page: Some(10_000),
        };
        let request = params.to_request(&cfg);
        assert_eq!(request.page, 3);
        assert_eq!(request.per_page, cfg.api_max_page_size);

        let defaults = PaginationParams::default().to_request(&cfg);
        assert_eq!(defaults.page, 1);
        assert_eq!(defaults.per_page, cfg.api_default_page_size);
    }
}
