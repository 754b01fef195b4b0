use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::{
    auth::AuthUser, errors::ServiceError, middleware_helpers::ClientIp,
    services::audit::AuditContext, ApiResponse, AppState,
};

/// Pagination parameters for list operations
#[derive(Debug, Deserialize, Serialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Page clamped to at least 1 and size to 1..=100
    pub fn normalized(&self) -> (u64, u64) {
        (self.page.max(1), self.per_page.clamp(1, 100))
    }
}

/// Standard created response
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Audit attribution for the caller
pub fn audit_ctx(user: &AuthUser, ip: ClientIp) -> AuditContext {
    AuditContext::new(Some(user.usuario_id), ip.into_inner())
}

/// Staff, or a role granting `code`
pub async fn holds(state: &AppState, user: &AuthUser, code: &str) -> Result<bool, ServiceError> {
    if user.is_staff {
        return Ok(true);
    }
    Ok(state.auth.has_permission(user.usuario_id, code).await?)
}
