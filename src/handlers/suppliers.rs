use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::AuthUser,
    entities::proveedor,
    errors::ServiceError,
    handlers::common::{audit_ctx, created},
    middleware_helpers::ClientIp,
    services::suppliers::{SupplierInput, SupplierQuery},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    tag = "suppliers",
    params(SupplierQuery),
    responses((status = 200, description = "Suppliers by name")),
    security(("Bearer" = []))
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<SupplierQuery>,
) -> ApiResult<PaginatedResponse<proveedor::Model>> {
    let page = state.services.suppliers.list_suppliers(query).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers/{id}",
    tag = "suppliers",
    params(("id" = i32, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Supplier"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_supplier(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<proveedor::Model> {
    let supplier = state.services.suppliers.get_supplier(id).await?;
    Ok(Json(ApiResponse::success(supplier)))
}

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    tag = "suppliers",
    request_body = SupplierInput,
    responses(
        (status = 201, description = "Supplier created"),
        (status = 400, description = "Blank name", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<SupplierInput>,
) -> Result<(StatusCode, Json<ApiResponse<proveedor::Model>>), ServiceError> {
    let supplier = state
        .services
        .suppliers
        .create_supplier(payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(supplier))
}

#[utoipa::path(
    put,
    path = "/api/v1/suppliers/{id}",
    tag = "suppliers",
    params(("id" = i32, Path, description = "Supplier id")),
    request_body = SupplierInput,
    responses(
        (status = 200, description = "Supplier updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<SupplierInput>,
) -> ApiResult<proveedor::Model> {
    let supplier = state
        .services
        .suppliers
        .update_supplier(id, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(supplier)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/suppliers/{id}",
    tag = "suppliers",
    params(("id" = i32, Path, description = "Supplier id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Supplier has purchases", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .suppliers
        .delete_supplier(id, &audit_ctx(&user, ip))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
