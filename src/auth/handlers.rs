use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use super::{auth_middleware, with_cookie, AuthError, AuthService, AuthUser, UserProfile};
use crate::{events::Event, ApiResponse, AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Session routes. `/session` requires a valid session; login and logout
/// are public.
pub fn auth_routes(auth: Arc<AuthService>) -> Router<AppState> {
    Router::new()
        .route("/session", get(session_handler))
        .route_layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .layer(DefaultBodyLimit::max(1024 * 64))
}

/// Login handler
pub async fn login_handler(
    State(state): State<AppState>,
    Json(credentials): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    if credentials.validate().is_err() {
        return Err(AuthError::InvalidCredentials);
    }

    let account = state
        .auth
        .authenticate(&credentials.email, &credentials.password)
        .await?;
    let session = state.auth.issue_token(&account)?;

    let profile = match state.services.users.record_login(account.id).await {
        Ok(updated) => updated,
        Err(e) => {
            warn!(user_id = %account.id, "Could not record login time: {}", e);
            UserProfile::from(account)
        }
    };
    state
        .event_sender
        .send_or_log(Event::UserLoggedIn(profile.id))
        .await;
    info!(user_id = %profile.id, "User logged in");

    let cookie = state.auth.session_cookie(&session.token);
    let body = ApiResponse::success(LoginResponse {
        user: profile,
        token: session.token,
        token_type: session.token_type,
        expires_in: session.expires_in,
    });
    Ok(with_cookie((StatusCode::OK, Json(body)).into_response(), &cookie))
}

/// Revokes the presented session, if any, and clears the cookie
pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = state.auth.token_from_headers(&headers) {
        if let Ok(claims) = state.auth.validate_token(&token) {
            state.auth.revoke(&claims.jti, claims.exp);
            info!(user_id = %claims.sub, "User logged out");
        }
    }

    let body = ApiResponse::success(serde_json::json!({ "logged_out": true }));
    with_cookie(
        (StatusCode::OK, Json(body)).into_response(),
        &state.auth.clear_cookie(),
    )
}

/// Current session's user profile
pub async fn session_handler(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<UserProfile>>, crate::errors::ServiceError> {
    let profile = state.services.users.get_user(user.user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
