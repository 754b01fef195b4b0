use axum::{extract::State, Json};

use crate::{auth::AuthUser, services::customers::CustomerProfile, ApiResponse, ApiResult, AppState};

#[utoipa::path(
    get,
    path = "/api/v1/customers/me",
    tag = "customers",
    responses(
        (status = 200, description = "Customer record, orders and pending total", body = ApiResponse<CustomerProfile>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn my_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<CustomerProfile> {
    let profile = state.services.customers.profile(user.usuario_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}
