use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::AuthUser,
    entities::envio,
    errors::ServiceError,
    handlers::common::{audit_ctx, created},
    middleware_helpers::ClientIp,
    services::deliveries::{AssignDeliveryInput, DeliveryStatusInput},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/delivery",
    tag = "deliveries",
    params(("id" = i32, Path, description = "Order id")),
    request_body = AssignDeliveryInput,
    responses(
        (status = 201, description = "Courier assigned"),
        (status = 400, description = "Not a delivery order or not ready", body = crate::errors::ErrorResponse),
        (status = 409, description = "Delivery already assigned", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<AssignDeliveryInput>,
) -> Result<(StatusCode, Json<ApiResponse<envio::Model>>), ServiceError> {
    let delivery = state
        .services
        .deliveries
        .assign_delivery(id, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(delivery))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/delivery/status",
    tag = "deliveries",
    params(("id" = i32, Path, description = "Order id")),
    request_body = DeliveryStatusInput,
    responses(
        (status = 200, description = "Delivery advanced"),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<DeliveryStatusInput>,
) -> ApiResult<envio::Model> {
    let delivery = state
        .services
        .deliveries
        .update_delivery_status(id, payload.estado, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(delivery)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/delivery",
    tag = "deliveries",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Delivery"),
        (status = 404, description = "No delivery for this order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_delivery(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<envio::Model> {
    let delivery = state.services.deliveries.get_delivery(id).await?;
    Ok(Json(ApiResponse::success(delivery)))
}
