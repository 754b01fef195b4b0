use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    services::reports::{CustomerHistory, HistoryQuery, StatusCount},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/reports/customer-history",
    tag = "reports",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Orders per customer with paid amounts", body = ApiResponse<CustomerHistory>),
        (status = 400, description = "Malformed date", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn customer_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<CustomerHistory> {
    let report = state.services.reports.customer_history(query).await?;
    Ok(Json(ApiResponse::success(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/status-summary",
    tag = "reports",
    responses((status = 200, description = "Order count and total per status", body = ApiResponse<Vec<StatusCount>>)),
    security(("Bearer" = []))
)]
pub async fn status_summary(State(state): State<AppState>) -> ApiResult<Vec<StatusCount>> {
    let summary = state.services.reports.status_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}
