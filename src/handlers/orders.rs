use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{consts as perm, AuthUser},
    entities::{calificacion, pedido},
    errors::ServiceError,
    handlers::common::{audit_ctx, created, holds},
    middleware_helpers::ClientIp,
    models::OrderStatus,
    services::{
        orders::{CreateOrderInput, LineItemInput, OrderDetail, OrderSummary},
        ratings::RateOrderInput,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ConfirmedQuery {
    /// Order id, or part of the customer's name
    pub q: Option<String>,
    #[serde(default = "first_page")]
    pub page: u64,
}

fn first_page() -> u64 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemsRequest {
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStatusRequest {
    pub estado: OrderStatus,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order placed"),
        (status = 400, description = "Invalid flavor or input", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<pedido::Model>>), ServiceError> {
    let order = state
        .services
        .orders
        .create_order(user.usuario_id, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with lines and payments", body = ApiResponse<OrderDetail>),
        (status = 404, description = "Not found or not visible", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<OrderDetail> {
    let can_read_all = holds(&state, &user, perm::PEDIDO_READ).await?;
    let detail = state
        .services
        .orders
        .order_detail(id, user.viewer(), can_read_all)
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/items",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    request_body = UpdateItemsRequest,
    responses(
        (status = 200, description = "Lines replaced and total recomputed", body = ApiResponse<OrderDetail>),
        (status = 400, description = "Invalid items or closed order", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_items(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateItemsRequest>,
) -> ApiResult<OrderDetail> {
    let detail = state
        .services
        .orders
        .update_items(id, user.viewer(), payload.items, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(detail)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/confirm",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order confirmed"),
        (status = 404, description = "No pending order of yours with that id", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn confirm_order(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> ApiResult<pedido::Model> {
    let order = state
        .services
        .orders
        .confirm(id, user.viewer(), &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled"),
        (status = 404, description = "No pending order of yours with that id", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> ApiResult<pedido::Model> {
    let order = state
        .services
        .orders
        .cancel(id, user.viewer(), &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/pending",
    tag = "orders",
    responses(
        (status = 200, description = "PENDIENTE orders, newest first", body = ApiResponse<Vec<OrderSummary>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn pending_orders(State(state): State<AppState>) -> ApiResult<Vec<OrderSummary>> {
    let orders = state.services.orders.pending_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/confirmed",
    tag = "orders",
    params(ConfirmedQuery),
    responses(
        (status = 200, description = "Confirmed-or-later orders", body = ApiResponse<PaginatedResponse<OrderSummary>>),
    ),
    security(("Bearer" = []))
)]
pub async fn confirmed_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ConfirmedQuery>,
) -> ApiResult<PaginatedResponse<OrderSummary>> {
    let page = state
        .services
        .orders
        .confirmed_orders(user.viewer(), query.q, query.page)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status changed"),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn set_status(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<SetStatusRequest>,
) -> ApiResult<pedido::Model> {
    let order = state
        .services
        .orders
        .set_status(id, payload.estado, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/rating",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    request_body = RateOrderInput,
    responses(
        (status = 201, description = "Rating stored"),
        (status = 400, description = "Order not delivered or score out of range", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already rated", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn rate_order(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<RateOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<calificacion::Model>>), ServiceError> {
    let rating = state
        .services
        .ratings
        .rate_order(id, user.viewer(), payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(rating))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/rating",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses((status = 200, description = "Rating, if any")),
    security(("Bearer" = []))
)]
pub async fn get_rating(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<Option<calificacion::Model>> {
    let rating = state.services.ratings.get_rating(id).await?;
    Ok(Json(ApiResponse::success(rating)))
}
