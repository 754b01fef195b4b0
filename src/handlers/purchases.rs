use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::{audit_ctx, created},
    middleware_helpers::ClientIp,
    services::purchases::{CreatePurchaseInput, PurchaseQuery, PurchaseSummary, PurchaseView},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/purchases",
    tag = "purchases",
    request_body = CreatePurchaseInput,
    responses(
        (status = 201, description = "Purchase recorded, not yet received", body = ApiResponse<PurchaseView>),
        (status = 400, description = "Invalid lines", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown supplier or ingredient", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_purchase(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<CreatePurchaseInput>,
) -> Result<(StatusCode, Json<ApiResponse<PurchaseView>>), ServiceError> {
    let purchase = state
        .services
        .purchases
        .create_purchase(payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(purchase))
}

#[utoipa::path(
    post,
    path = "/api/v1/purchases/{id}/receive",
    tag = "purchases",
    params(("id" = i32, Path, description = "Purchase id")),
    responses(
        (status = 200, description = "Stock entered for every line", body = ApiResponse<PurchaseView>),
        (status = 409, description = "Already received", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn receive_purchase(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> ApiResult<PurchaseView> {
    let purchase = state
        .services
        .purchases
        .receive_purchase(id, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(purchase)))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases",
    tag = "purchases",
    params(PurchaseQuery),
    responses((status = 200, description = "Purchases, newest first", body = ApiResponse<Vec<PurchaseSummary>>)),
    security(("Bearer" = []))
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<PurchaseQuery>,
) -> ApiResult<Vec<PurchaseSummary>> {
    let purchases = state.services.purchases.list_purchases(query).await?;
    Ok(Json(ApiResponse::success(purchases)))
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases/{id}",
    tag = "purchases",
    params(("id" = i32, Path, description = "Purchase id")),
    responses(
        (status = 200, description = "Purchase with lines", body = ApiResponse<PurchaseView>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_purchase(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<PurchaseView> {
    let purchase = state.services.purchases.get_purchase(id).await?;
    Ok(Json(ApiResponse::success(purchase)))
}
