use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::{consts as perm, AuthUser},
    entities::pago,
    errors::ServiceError,
    handlers::common::{audit_ctx, created, holds},
    middleware_helpers::ClientIp,
    models::PaymentSummary,
    services::{
        checkout::{CheckoutOutcome, CheckoutStart},
        payments::{PaymentReceipt, RegisterPaymentInput},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CheckoutReturn {
    pub session_id: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payments",
    tag = "payments",
    params(("id" = i32, Path, description = "Order id")),
    request_body = RegisterPaymentInput,
    responses(
        (status = 201, description = "Payment recorded", body = ApiResponse<PaymentReceipt>),
        (status = 400, description = "Non-positive amount or cancelled order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found or not visible", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn register_payment(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<RegisterPaymentInput>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentReceipt>>), ServiceError> {
    let can_manage = holds(&state, &user, perm::PAGO_WRITE).await?;
    let receipt = state
        .services
        .payments
        .register_payment(id, user.viewer(), can_manage, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(receipt))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/payments",
    tag = "payments",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Payments, oldest first"),
        (status = 404, description = "Not found or not visible", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_payments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Vec<pago::Model>> {
    let can_read_all = holds(&state, &user, perm::PEDIDO_READ).await?;
    let payments = state
        .services
        .payments
        .list_payments(id, user.viewer(), can_read_all)
        .await?;
    Ok(Json(ApiResponse::success(payments)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/payments/summary",
    tag = "payments",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Paid so far and balance", body = ApiResponse<PaymentSummary>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn payment_summary(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<PaymentSummary> {
    let summary = state.services.payments.payment_summary(id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/checkout",
    tag = "payments",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 201, description = "Hosted checkout opened", body = ApiResponse<CheckoutStart>),
        (status = 400, description = "Nothing left to pay", body = crate::errors::ErrorResponse),
        (status = 502, description = "Card provider unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutStart>>), ServiceError> {
    let session = state
        .services
        .checkout
        .start_checkout(id, user.viewer())
        .await?;
    Ok(created(session))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/checkout/success",
    tag = "payments",
    params(("id" = i32, Path, description = "Order id"), CheckoutReturn),
    responses(
        (status = 200, description = "Payment recorded, already recorded, or not paid", body = ApiResponse<CheckoutOutcome>),
        (status = 502, description = "Card provider unavailable", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn checkout_success(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Query(params): Query<CheckoutReturn>,
) -> ApiResult<CheckoutOutcome> {
    let outcome = state
        .services
        .checkout
        .confirm_checkout(id, &params.session_id, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/checkout/cancel",
    tag = "payments",
    params(("id" = i32, Path, description = "Order id")),
    responses((status = 200, description = "Checkout abandoned; balance unchanged", body = ApiResponse<PaymentSummary>)),
    security(("Bearer" = []))
)]
pub async fn checkout_cancel(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<PaymentSummary> {
    let summary = state.services.checkout.cancel_checkout(id).await?;
    Ok(Json(ApiResponse::success(summary)))
}
