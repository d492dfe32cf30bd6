use axum::{extract::State, routing::get, Json, Router};

use crate::{handlers::AppState, services::dashboard::DashboardSummary, ApiResponse, ApiResult};

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/dashboard", get(summary))
}

/// Headline counters for the landing page
async fn summary(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let summary = state.services.dashboard.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}
