use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::AuthUser,
    entities::{insumo, kardex},
    errors::ServiceError,
    handlers::common::{audit_ctx, created},
    middleware_helpers::ClientIp,
    services::{
        inventory::{IngredientInput, KardexQuery, MovementInput, StockLevel},
        recipes::{RecipeLineInput, RecipeLineView},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRecipeRequest {
    pub lineas: Vec<RecipeLineInput>,
}

#[utoipa::path(
    get,
    path = "/api/v1/ingredients",
    tag = "inventory",
    responses((status = 200, description = "Ingredients by name")),
    security(("Bearer" = []))
)]
pub async fn list_ingredients(State(state): State<AppState>) -> ApiResult<Vec<insumo::Model>> {
    let ingredients = state.services.inventory.list_ingredients().await?;
    Ok(Json(ApiResponse::success(ingredients)))
}

#[utoipa::path(
    get,
    path = "/api/v1/ingredients/{id}",
    tag = "inventory",
    params(("id" = i32, Path, description = "Ingredient id")),
    responses(
        (status = 200, description = "Ingredient"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_ingredient(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<insumo::Model> {
    let ingredient = state.services.inventory.get_ingredient(id).await?;
    Ok(Json(ApiResponse::success(ingredient)))
}

#[utoipa::path(
    post,
    path = "/api/v1/ingredients",
    tag = "inventory",
    request_body = IngredientInput,
    responses(
        (status = 201, description = "Ingredient created with zero stock"),
        (status = 409, description = "Name taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Json(payload): Json<IngredientInput>,
) -> Result<(StatusCode, Json<ApiResponse<insumo::Model>>), ServiceError> {
    let ingredient = state
        .services
        .inventory
        .create_ingredient(payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(ingredient))
}

#[utoipa::path(
    put,
    path = "/api/v1/ingredients/{id}",
    tag = "inventory",
    params(("id" = i32, Path, description = "Ingredient id")),
    request_body = IngredientInput,
    responses(
        (status = 200, description = "Ingredient updated"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<IngredientInput>,
) -> ApiResult<insumo::Model> {
    let ingredient = state
        .services
        .inventory
        .update_ingredient(id, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(ingredient)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/ingredients/{id}",
    tag = "inventory",
    params(("id" = i32, Path, description = "Ingredient id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Referenced by movements, recipes or purchases", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state
        .services
        .inventory
        .delete_ingredient(id, &audit_ctx(&user, ip))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/ingredients/{id}/movements",
    tag = "inventory",
    params(("id" = i32, Path, description = "Ingredient id")),
    request_body = MovementInput,
    responses(
        (status = 201, description = "Movement appended to the kardex"),
        (status = 400, description = "Non-positive quantity", body = crate::errors::ErrorResponse),
        (status = 422, description = "Outflow exceeds stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn record_movement(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(id): Path<i32>,
    Json(payload): Json<MovementInput>,
) -> Result<(StatusCode, Json<ApiResponse<kardex::Model>>), ServiceError> {
    let movement = state
        .services
        .inventory
        .record_movement(id, payload, &audit_ctx(&user, ip))
        .await?;
    Ok(created(movement))
}

#[utoipa::path(
    get,
    path = "/api/v1/ingredients/{id}/stock",
    tag = "inventory",
    params(("id" = i32, Path, description = "Ingredient id")),
    responses((status = 200, description = "Ledger stock", body = ApiResponse<StockLevel>)),
    security(("Bearer" = []))
)]
pub async fn stock_level(State(state): State<AppState>, Path(id): Path<i32>) -> ApiResult<StockLevel> {
    let level = state.services.inventory.stock_level(id).await?;
    Ok(Json(ApiResponse::success(level)))
}

#[utoipa::path(
    get,
    path = "/api/v1/kardex",
    tag = "inventory",
    params(KardexQuery),
    responses((status = 200, description = "Movements, newest first")),
    security(("Bearer" = []))
)]
pub async fn list_kardex(
    State(state): State<AppState>,
    Query(query): Query<KardexQuery>,
) -> ApiResult<Vec<kardex::Model>> {
    let movements = state.services.inventory.kardex(query).await?;
    Ok(Json(ApiResponse::success(movements)))
}

#[utoipa::path(
    get,
    path = "/api/v1/recipes/{producto_id}",
    tag = "inventory",
    params(("producto_id" = i32, Path, description = "Product id")),
    responses((status = 200, description = "Ingredients per unit", body = ApiResponse<Vec<RecipeLineView>>)),
    security(("Bearer" = []))
)]
pub async fn get_recipe(
    State(state): State<AppState>,
    Path(producto_id): Path<i32>,
) -> ApiResult<Vec<RecipeLineView>> {
    let recipe = state.services.recipes.get_recipe(producto_id).await?;
    Ok(Json(ApiResponse::success(recipe)))
}

#[utoipa::path(
    put,
    path = "/api/v1/recipes/{producto_id}",
    tag = "inventory",
    params(("producto_id" = i32, Path, description = "Product id")),
    request_body = SetRecipeRequest,
    responses(
        (status = 200, description = "Recipe replaced", body = ApiResponse<Vec<RecipeLineView>>),
        (status = 400, description = "Invalid quantities or unknown ingredient", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn set_recipe(
    State(state): State<AppState>,
    user: AuthUser,
    ip: ClientIp,
    Path(producto_id): Path<i32>,
    Json(payload): Json<SetRecipeRequest>,
) -> ApiResult<Vec<RecipeLineView>> {
    let recipe = state
        .services
        .recipes
        .set_recipe(producto_id, payload.lineas, &audit_ctx(&user, ip))
        .await?;
    Ok(Json(ApiResponse::success(recipe)))
}
