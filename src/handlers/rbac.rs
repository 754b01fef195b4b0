use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::AuthUser,
    entities::permiso,
    errors::ServiceError,
    handlers::common::{audit_ctx, created},
    middleware_helpers::ClientIp,
    services::rbac::{AssignRolesInput, AssignRolesResponse, RoleInput, RoleView, UserRolesView},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/admin/permissions",
    tag = "admin",
    responses((status = 200, description = "Permission catalogue")),
    security(("Bearer" = []))
)]
pub async fn list_permissions(State(state): State<AppState>) -> ApiResult<Vec<permiso::Model>> {
    let permissions = state.services.rbac.list_permissions().await?;
    Ok(Json(ApiResponse::success(permissions)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/roles",
    tag = "admin",
    responses((status = 200, description = "Roles with their permission ids", body = ApiResponse<Vec<RoleView>>)),
    security(("Bearer" = []))
)]
pub async fn list_roles(State(state): State<AppState>) -> ApiResult<Vec<RoleView>> {
    let roles = state.services.rbac.list_roles().await?;
    Ok(Json(ApiResponse::success(roles)))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/roles/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = ApiResponse<RoleView>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_role(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<RoleView> {
    let role = state.services.rbac.get_role(id).await?;
    Ok(Json(ApiResponse::success(role)))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/roles",
    tag = "admin",
    request_body = RoleInput,
    responses(
        (status = 201, description = "Role created", body = ApiResponse<RoleView>),
        (status = 409, description = "Name taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<RoleInput>,
) -> Result<(StatusCode, Json<ApiResponse<RoleView>>), ServiceError> {
    let role = state
        .services
        .rbac
        .create_role(payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(role))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/roles/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Role id")),
    request_body = RoleInput,
    responses(
        (status = 200, description = "Name and permission set replaced", body = ApiResponse<RoleView>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<RoleInput>,
) -> ApiResult<RoleView> {
    let role = state
        .services
        .rbac
        .update_role(id, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(role)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/roles/{id}",
    tag = "admin",
    params(("id" = i32, Path, description = "Role id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Role still assigned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_role(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .rbac
        .delete_role(id, &audit_ctx(&user, ip))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "admin",
    responses((status = 200, description = "Users with their role ids", body = ApiResponse<Vec<UserRolesView>>)),
    security(("Bearer" = []))
)]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserRolesView>> {
    let users = state.services.rbac.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/roles",
    tag = "admin",
    params(("id" = i32, Path, description = "User id")),
    request_body = AssignRolesInput,
    responses(
        (status = 200, description = "Role set replaced", body = ApiResponse<AssignRolesResponse>),
        (status = 404, description = "Unknown user or role", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_roles(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<AssignRolesInput>,
) -> ApiResult<AssignRolesResponse> {
    let response = state
        .services
        .rbac
        .assign_roles(id, payload.roles, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(response)))
}
