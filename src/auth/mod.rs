/*!
 * # Authentication and Authorization Module
 *
 * Bearer JWTs identify the caller. Permission checks resolve the caller's
 * roles against the `rol_permiso` table on every guarded request, so role
 * edits take effect without re-issuing tokens. Staff accounts pass every
 * permission check.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::{permiso, rol, rol_permiso, usuario, usuario_rol};
use crate::errors::ServiceError;

pub mod password;
pub mod permissions;

pub use permissions::consts;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // usuario id
    pub email: String,
    pub nombre: String,
    pub staff: bool,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub usuario_id: i32,
    pub email: String,
    pub nombre: String,
    pub is_staff: bool,
    pub token_id: String,
    pub token_expires_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn viewer(&self) -> Viewer {
        Viewer {
            usuario_id: self.usuario_id,
            is_staff: self.is_staff,
        }
    }
}

/// Who is asking, as seen by the services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub usuario_id: i32,
    pub is_staff: bool,
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

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )
    }
}

/// Issues and validates tokens and answers permission questions
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
}

/// Token blacklist entry
#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: DateTime<Utc>,
}

/// Token response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Signs an HS256 access token for `user`
    pub fn generate_token(&self, user: &usuario::Model) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            nombre: user.nombre.clone(),
            staff: user.es_staff,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

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

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Blacklists a token id until the token would have expired anyway
    pub async fn revoke(&self, jti: &str, expiry: DateTime<Utc>) {
        let mut blacklist = self.blacklisted_tokens.write().await;
        let now = Utc::now();
        blacklist.retain(|t| t.expiry > now);
        blacklist.push(BlacklistedToken {
            jti: jti.to_string(),
            expiry,
        });
        debug!(jti, "token revoked");
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }

    /// True if the user is staff or one of their roles grants `codigo`
    pub async fn has_permission(&self, usuario_id: i32, codigo: &str) -> Result<bool, AuthError> {
        let user = usuario::Entity::find_by_id(usuario_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;
        if !user.activo {
            return Ok(false);
        }
        if user.es_staff {
            return Ok(true);
        }

        let granted = permiso::Entity::find()
            .join(JoinType::InnerJoin, permiso::Relation::RolPermiso.def())
            .join(JoinType::InnerJoin, rol_permiso::Relation::Rol.def())
            .join(JoinType::InnerJoin, rol::Relation::UsuarioRol.def())
            .filter(usuario_rol::Column::UsuarioId.eq(usuario_id))
            .filter(permiso::Column::Codigo.eq(codigo))
            .count(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        Ok(granted > 0)
    }

    /// Codes the user effectively holds, sorted
    pub async fn effective_permissions(&self, user: &usuario::Model) -> Result<Vec<String>, ServiceError> {
        if user.es_staff {
            return Ok(permissions::CATALOGUE
                .iter()
                .map(|(codigo, _)| codigo.to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect());
        }

        let granted = permiso::Entity::find()
            .join(JoinType::InnerJoin, permiso::Relation::RolPermiso.def())
            .join(JoinType::InnerJoin, rol_permiso::Relation::Rol.def())
            .join(JoinType::InnerJoin, rol::Relation::UsuarioRol.def())
            .filter(usuario_rol::Column::UsuarioId.eq(user.id))
            .order_by_asc(permiso::Column::Codigo)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(granted
            .into_iter()
            .map(|p| p.codigo)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    pub async fn role_names(&self, usuario_id: i32) -> Result<Vec<String>, ServiceError> {
        let roles = rol::Entity::find()
            .join(JoinType::InnerJoin, rol::Relation::UsuarioRol.def())
            .filter(usuario_rol::Column::UsuarioId.eq(usuario_id))
            .order_by_asc(rol::Column::Nombre)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(roles.into_iter().map(|r| r.nombre).collect())
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
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

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Could not issue token".to_string(),
            ),
            Self::UserNotFound => (
                StatusCode::UNAUTHORIZED,
                "AUTH_USER_NOT_FOUND",
                "User not found".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions".to_string(),
            ),
            Self::DatabaseError(msg) => {
                error!(error = %msg, "permission lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTH_DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::DatabaseError(msg) | AuthError::InternalError(msg) => {
                ServiceError::InternalError(msg)
            }
            AuthError::TokenCreation(msg) => ServiceError::JwtError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Permission middleware to check if a user has the required permission
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    if user.is_staff {
        return Ok(next.run(request).await);
    }

    let auth_service = request
        .extensions()
        .get::<Arc<AuthService>>()
        .cloned()
        .ok_or_else(|| AuthError::InternalError("Authentication service not available".into()))?;

    if !auth_service
        .has_permission(user.usuario_id, &required_permission)
        .await?
    {
        debug!(
            usuario_id = user.usuario_id,
            permission = %required_permission,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Authentication middleware that extracts and validates auth tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return AuthError::InternalError("Authentication service not available".into())
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Bearer token from the `Authorization` header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn extract_auth_from_headers(
    headers: &HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingAuth)?;
    let claims = auth_service.validate_token(token).await?;
    let usuario_id = claims
        .sub
        .parse::<i32>()
        .map_err(|_| AuthError::InvalidToken)?;
    let token_expires_at =
        DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidToken)?;

    Ok(AuthUser {
        usuario_id,
        email: claims.email,
        nombre: claims.nombre,
        is_staff: claims.staff,
        token_id: claims.jti,
        token_expires_at,
    })
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(
            AuthConfig::new(
                "unit_test_secret_that_is_long_enough_123456".into(),
                "dulce-bocatto".into(),
                "dulce-bocatto-auth".into(),
                Duration::from_secs(600),
            ),
            Arc::new(DatabaseConnection::Disconnected),
        )
    }

    fn user() -> usuario::Model {
        usuario::Model {
            id: 7,
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            hash_password: String::new(),
            telefono: None,
            activo: true,
            es_staff: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn issued_tokens_validate() {
        let svc = service();
        let token = svc.generate_token(&user()).unwrap();
        let claims = svc.validate_token(&token.access_token).await.unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, "ana@example.com");
        assert!(!claims.staff);
        assert_eq!(token.token_type, "Bearer");
    }

    #[tokio::test]
    async fn tokens_from_another_audience_are_rejected() {
        let svc = service();
        let mut other = service();
        other.config.jwt_audience = "someone-else".into();
        let token = other.generate_token(&user()).unwrap();
        assert_matches!(
            svc.validate_token(&token.access_token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn revoked_tokens_are_rejected() {
        let svc = service();
        let token = svc.generate_token(&user()).unwrap();
        let claims = svc.validate_token(&token.access_token).await.unwrap();
        svc.revoke(&claims.jti, Utc::now() + ChronoDuration::minutes(10))
            .await;
        assert_matches!(
            svc.validate_token(&token.access_token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn auth_errors_map_to_service_errors() {
        assert_eq!(
            ServiceError::from(AuthError::InsufficientPermissions).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::from(AuthError::InvalidCredentials).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }
}
