use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    auth::AuthUser,
    entities::pedido,
    handlers::common::audit_ctx,
    middleware_helpers::ClientIp,
    services::{orders::OrderSummary, production::ProductionPlan},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/production/queue",
    tag = "production",
    responses((status = 200, description = "Confirmed and in-production orders, earliest due first", body = ApiResponse<Vec<OrderSummary>>)),
    security(("Bearer" = []))
)]
pub async fn production_queue(State(state): State<AppState>) -> ApiResult<Vec<OrderSummary>> {
    let queue = state.services.production.production_queue().await?;
    Ok(Json(ApiResponse::success(queue)))
}

#[utoipa::path(
    get,
    path = "/api/v1/production/orders/{id}/plan",
    tag = "production",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Per-line ingredient requirements", body = ApiResponse<ProductionPlan>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn production_plan(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<ProductionPlan> {
    let plan = state.services.production.production_plan(id).await?;
    Ok(Json(ApiResponse::success(plan)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/orders/{id}/start",
    tag = "production",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order in production"),
        (status = 400, description = "Order not confirmed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn start_production(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> ApiResult<pedido::Model> {
    let order = state
        .services
        .production
        .start_production(id, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/orders/{id}/items/{producto_id}/{sabor_id}",
    tag = "production",
    params(
        ("id" = i32, Path, description = "Order id"),
        ("producto_id" = i32, Path, description = "Product id"),
        ("sabor_id" = i32, Path, description = "Flavor id"),
    ),
    responses(
        (status = 200, description = "Line produced and ingredients deducted", body = ApiResponse<ProductionPlan>),
        (status = 409, description = "Line already produced", body = crate::errors::ErrorResponse),
        (status = 422, description = "Missing ingredients", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn produce_item(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path((id, producto_id, sabor_id)): Path<(i32, i32, i32)>,
) -> ApiResult<ProductionPlan> {
    let plan = state
        .services
        .production
        .produce_item(id, producto_id, sabor_id, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(plan)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production/orders/{id}/ready",
    tag = "production",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order ready for pickup or delivery"),
        (status = 400, description = "Lines still pending", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn mark_ready(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> ApiResult<pedido::Model> {
    let order = state
        .services
        .production
        .mark_ready(id, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
