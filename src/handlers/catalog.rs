use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    entities::sabor,
    errors::ServiceError,
    handlers::common::created,
    services::catalog::{CatalogView, FlavorInput, ProductInput, ProductView},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ActiveFilter {
    #[serde(default)]
    pub active_only: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/catalog",
    tag = "catalog",
    responses((status = 200, description = "Active flavors and the cookie price", body = ApiResponse<CatalogView>))
)]
pub async fn get_catalog(State(state): State<AppState>) -> ApiResult<CatalogView> {
    let catalog = state.services.catalog.catalog().await?;
    Ok(Json(ApiResponse::success(catalog)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "catalog",
    params(ActiveFilter),
    responses((status = 200, description = "Products by name", body = ApiResponse<Vec<ProductView>>))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ActiveFilter>,
) -> ApiResult<Vec<ProductView>> {
    let products = state.services.catalog.list_products(filter.active_only).await?;
    Ok(Json(ApiResponse::success(products)))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    tag = "catalog",
    params(("id" = i32, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<ProductView>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_product(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<ProductView> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    tag = "catalog",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductView>),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<ProductView>>), ServiceError> {
    let product = state.services.catalog.create_product(payload).await?;
    Ok(created(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    tag = "catalog",
    params(("id" = i32, Path, description = "Product id")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductView>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ProductInput>,
) -> ApiResult<ProductView> {
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    get,
    path = "/api/v1/flavors",
    tag = "catalog",
    params(ActiveFilter),
    responses((status = 200, description = "Flavors by name"))
)]
pub async fn list_flavors(
    State(state): State<AppState>,
    Query(filter): Query<ActiveFilter>,
) -> ApiResult<Vec<sabor::Model>> {
    let flavors = state.services.catalog.list_flavors(filter.active_only).await?;
    Ok(Json(ApiResponse::success(flavors)))
}

#[utoipa::path(
    post,
    path = "/api/v1/flavors",
    tag = "catalog",
    request_body = FlavorInput,
    responses(
        (status = 201, description = "Flavor created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_flavor(
    State(state): State<AppState>,
    Json(payload): Json<FlavorInput>,
) -> Result<(StatusCode, Json<ApiResponse<sabor::Model>>), ServiceError> {
    let flavor = state.services.catalog.create_flavor(payload).await?;
    Ok(created(flavor))
}

#[utoipa::path(
    put,
    path = "/api/v1/flavors/{id}",
    tag = "catalog",
    params(("id" = i32, Path, description = "Flavor id")),
    request_body = FlavorInput,
    responses(
        (status = 200, description = "Flavor updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_flavor(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<FlavorInput>,
) -> ApiResult<sabor::Model> {
    let flavor = state.services.catalog.update_flavor(id, payload).await?;
    Ok(Json(ApiResponse::success(flavor)))
}
