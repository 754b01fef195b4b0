use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::AuthUser,
    entities::factura,
    errors::ServiceError,
    handlers::common::{audit_ctx, created},
    middleware_helpers::ClientIp,
    services::invoices::IssueInvoiceInput,
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/invoice",
    tag = "invoices",
    params(("id" = i32, Path, description = "Order id")),
    request_body = IssueInvoiceInput,
    responses(
        (status = 201, description = "Invoice issued"),
        (status = 400, description = "Order not confirmed", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already invoiced", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn issue_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<IssueInvoiceInput>,
) -> Result<(StatusCode, Json<ApiResponse<factura::Model>>), ServiceError> {
    let invoice = state
        .services
        .invoices
        .issue_invoice(id, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(invoice))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/invoice",
    tag = "invoices",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Invoice"),
        (status = 404, description = "Not invoiced", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_invoice(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<factura::Model> {
    let invoice = state.services.invoices.get_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}
