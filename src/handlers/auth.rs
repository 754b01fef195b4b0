use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::created,
    middleware_helpers::ClientIp,
    services::accounts::{
        AccountView, ChangePasswordInput, LoginInput, LoginResponse, MeResponse, RegisterInput,
        UpdateProfileInput,
    },
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterInput,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AccountView>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<RegisterInput>,
) -> Result<(StatusCode, Json<ApiResponse<AccountView>>), ServiceError> {
    let account = state
        .services
        .accounts
        .register(payload, ip.into_inner())
        .await?;
    Ok(created(account))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginInput,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<LoginInput>,
) -> ApiResult<LoginResponse> {
    let response = state
        .services
        .accounts
        .login(payload, ip.into_inner())
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses((status = 204, description = "Token revoked")),
    security(("Bearer" = []))
)]
pub async fn logout(State(state): State<AppState>, user: AuthUser, ip: ClientIp) -> StatusCode {
    state
        .services
        .accounts
        .logout(&user, ip.into_inner())
        .await;
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current account, roles and permissions", body = ApiResponse<MeResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<MeResponse> {
    let me = state.services.accounts.me(user.usuario_id).await?;
    Ok(Json(ApiResponse::success(me)))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/me",
    tag = "auth",
    request_body = UpdateProfileInput,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<MeResponse>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<UpdateProfileInput>,
) -> ApiResult<MeResponse> {
    let me = state
        .services
        .accounts
        .update_profile(user.usuario_id, payload, ip.into_inner())
        .await?;
    Ok(Json(ApiResponse::success(me)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/password",
    tag = "auth",
    request_body = ChangePasswordInput,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password does not match", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<ChangePasswordInput>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .accounts
        .change_password(user.usuario_id, payload, ip.into_inner())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
