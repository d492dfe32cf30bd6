/*!
 * # Authentication and Authorization Module
 *
 * Session authentication for the API:
 *
 * - Credentials login checked against argon2 password hashes
 * - Signed session tokens (JWT, HS256) delivered in an `HttpOnly` cookie and
 *   also accepted as `Authorization: Bearer`
 * - Token revocation on logout
 * - Role gating for admin-only and write routes
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::ApiResponse;

pub mod user;

mod handlers;

pub use handlers::auth_routes;
pub use user::{UserProfile, UserRole};

/// Claim structure for session tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
}

/// Authenticated user attached to the request by [`auth_middleware`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub token_id: String,
    pub expires_at: i64,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Administrator role required".to_string(),
            ))
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        issuer: String,
        session_ttl: Duration,
        cookie_name: String,
        cookie_secure: bool,
    ) -> Self {
        Self {
            jwt_secret,
            issuer,
            session_ttl,
            cookie_name,
            cookie_secure,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.session_ttl_secs),
            cfg.session_cookie_name.clone(),
            cfg.session_cookie_secure,
        )
    }
}

/// Session token handed to the client on login
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip)]
    pub claims: Claims,
}

/// Authentication service that handles password checks and session tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    /// Revoked token ids mapped to their expiry timestamp.
    revoked_tokens: Arc<DashMap<String, i64>>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            revoked_tokens: Arc::new(DashMap::new()),
        }
    }

    /// Hashes a password with argon2 and a random salt.
    pub fn hash_password(password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::HashError(e.to_string()))
    }

    pub fn verify_password(hash: &str, password: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash is malformed: {}", e);
                false
            }
        }
    }

    /// Checks credentials and returns the active user they belong to.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<user::Model, AuthError> {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let Some(found) = found else {
            debug!("Login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        if !Self::verify_password(&found.password_hash, password) {
            return Err(AuthError::InvalidCredentials);
        }
        if !found.active {
            return Err(AuthError::InactiveUser);
        }
        Ok(found)
    }

    /// Issues a session token for a user
    pub fn issue_token(&self, user: &user::Model) -> Result<SessionToken, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.session_ttl)
                .map_err(|_| AuthError::InternalError("Invalid session duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(SessionToken {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.session_ttl.as_secs() as i64,
            claims,
        })
    }

    /// Validate a session token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.revoked_tokens.contains_key(&claims.jti) {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Revokes a token id until its natural expiry.
    pub fn revoke(&self, token_id: &str, expires_at: i64) {
        let now = Utc::now().timestamp();
        self.revoked_tokens.retain(|_, exp| *exp > now);
        self.revoked_tokens.insert(token_id.to_string(), expires_at);
    }

    /// Resolves a token to the user it was issued for. The account must
    /// still exist and be active; the role is read from the account so role
    /// changes apply immediately.
    pub async fn resolve(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.validate_token(token)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let account = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;
        if !account.active {
            return Err(AuthError::InactiveUser);
        }

        Ok(AuthUser {
            user_id: account.id,
            name: account.name,
            email: account.email,
            role: account.role,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }

    /// `Set-Cookie` value carrying a session token.
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie_with(token, self.config.session_ttl.as_secs())
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        self.cookie_with("", 0)
    }

    fn cookie_with(&self, value: &str, max_age: u64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.config.cookie_name, value, max_age
        );
        if self.config.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Reads the session token from the `Authorization` header or the
    /// session cookie, in that order.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if bearer.is_some() {
            return bearer;
        }

        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.config.cookie_name)
            .map(|(_, value)| value.to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User account is disabled")]
    InactiveUser,

    #[error("Invalid session token")]
    InvalidToken,

    #[error("Session has expired")]
    TokenExpired,

    #[error("Session has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "authentication failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err.status_code() {
            StatusCode::FORBIDDEN => ServiceError::Forbidden(err.to_string()),
            StatusCode::UNAUTHORIZED => ServiceError::Unauthorized(err.to_string()),
            _ => ServiceError::InternalError(err.to_string()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Authentication middleware that resolves the session and attaches the user
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = auth_service
        .token_from_headers(request.headers())
        .ok_or(AuthError::MissingAuth)?;
    let user = auth_service.resolve(&token).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Role middleware: the user must hold one of the listed roles
pub async fn role_middleware(
    State(required): State<Arc<[UserRole]>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    if !required.contains(&user.role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Read-only accounts may only issue safe requests
pub async fn write_access_middleware(request: Request, next: Next) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;

    let safe = matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    );
    if !safe && !user.role.can_write() {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self, auth: Arc<AuthService>) -> Self;
    fn with_role(self, roles: &[UserRole]) -> Self;
    fn with_write_access(self) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth: Arc<AuthService>) -> Self {
        self.layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
    }

    fn with_role(self, roles: &[UserRole]) -> Self {
        let roles: Arc<[UserRole]> = roles.into();
        self.route_layer(axum::middleware::from_fn_with_state(
            roles,
            role_middleware,
        ))
    }

    fn with_write_access(self) -> Self {
        self.route_layer(axum::middleware::from_fn(write_access_middleware))
    }
}

/// Appends a `Set-Cookie` header to a response.
pub(crate) fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!("Could not encode session cookie: {}", e),
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AuthService {
        let db = DatabaseConnection::Disconnected;
        AuthService::new(
            AuthConfig::new(
                "unit_test_secret_that_is_long_enough_for_hs256".to_string(),
                "aberturas-test".to_string(),
                Duration::from_secs(3600),
                "aberturas_session".to_string(),
                false,
            ),
            Arc::new(db),
        )
    }

    fn account() -> user::Model {
        user::Model {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: String::new(),
            role: UserRole::Sales,
            branch_id: None,
            phone: None,
            avatar: None,
            active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_hashes_verify() {
        let hash = AuthService::hash_password("correct horse").unwrap();
        assert!(AuthService::verify_password(&hash, "correct horse"));
        assert!(!AuthService::verify_password(&hash, "wrong horse"));
        assert!(!AuthService::verify_password("not-a-hash", "correct horse"));
    }

    #[test]
    fn issued_tokens_validate_until_revoked() {
        let auth = service();
        let session = auth.issue_token(&account()).unwrap();
        let claims = auth.validate_token(&session.token).unwrap();
        assert_eq!(claims.role, UserRole::Sales);

        auth.revoke(&claims.jti, claims.exp);
        assert_matches!(
            auth.validate_token(&session.token),
            Err(AuthError::RevokedToken)
        );
    }

    #[test]
    fn tokens_from_other_secrets_are_rejected() {
        let auth = service();
        let mut other = service();
        other.config.jwt_secret = "another_secret_that_is_also_long_enough_xx".to_string();
        let session = other.issue_token(&account()).unwrap();
        assert_matches!(
            auth.validate_token(&session.token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn token_is_read_from_bearer_or_cookie() {
        let auth = service();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; aberturas_session=abc.def.ghi"),
        );
        assert_eq!(auth.token_from_headers(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz"),
        );
        assert_eq!(auth.token_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn cookies_are_http_only() {
        let auth = service();
        let cookie = auth.session_cookie("tok");
        assert!(cookie.starts_with("aberturas_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(auth.clear_cookie().contains("Max-Age=0"));
    }
}
