use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    entities::bitacora,
    handlers::common::PaginationParams,
    services::audit::AuditFilter,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/audit",
    tag = "audit",
    params(AuditFilter, PaginationParams),
    responses((status = 200, description = "Audit trail, newest first")),
    security(("Bearer" = []))
)]
pub async fn list_audit(
    State(state): State<AppState>,
    Query(filter): Query<AuditFilter>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<PaginatedResponse<bitacora::Model>> {
    let (page, per_page) = pagination.normalized();
    let entries = state.services.audit.list(filter, page, per_page).await?;
    Ok(Json(ApiResponse::success(entries)))
}
