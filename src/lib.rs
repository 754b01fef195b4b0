//! Dulce Bocatto API
//!
//! Order lifecycle backend for a cookie bakery: catalogue, customer orders,
//! payments and invoices, production against recipes, ingredient stock,
//! purchasing, delivery, reports and the audit trail.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod seed;
pub mod services;
pub mod tracing;

use axum::{
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::services::checkout::CheckoutGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Wires the auth service and every domain service over one pool
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        checkout_gateway: Option<Arc<dyn CheckoutGateway>>,
    ) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let services =
            handlers::AppServices::new(db.clone(), &config, auth.clone(), checkout_gateway);
        Self {
            db,
            config,
            services,
            auth,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let limit = limit.max(1);
        Self {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route with its auth and permission gate
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{
        audit, auth, catalog, customers, deliveries, inventory, invoices, orders, payments,
        production, purchases, rbac, reports, suppliers,
    };

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/catalog", get(catalog::get_catalog))
        .route("/products", get(catalog::list_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/flavors", get(catalog::list_flavors));

    // Any signed-in user; ownership is checked by the services
    let signed_in = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me).put(auth::update_profile))
        .route("/auth/password", post(auth::change_password))
        .route("/customers/me", get(customers::my_profile))
        .route("/orders", post(orders::create_order))
        .route("/orders/confirmed", get(orders::confirmed_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/items", put(orders::update_items))
        .route("/orders/:id/confirm", post(orders::confirm_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        .route(
            "/orders/:id/payments",
            get(payments::list_payments).post(payments::register_payment),
        )
        .route("/orders/:id/checkout", post(payments::start_checkout))
        .route("/orders/:id/checkout/success", get(payments::checkout_success))
        .route("/orders/:id/checkout/cancel", get(payments::checkout_cancel))
        .route(
            "/orders/:id/rating",
            get(orders::get_rating).post(orders::rate_order),
        )
        .with_auth();

    let orders_read = Router::new()
        .route("/orders/pending", get(orders::pending_orders))
        .route("/orders/:id/payments/summary", get(payments::payment_summary))
        .route("/orders/:id/invoice", get(invoices::get_invoice))
        .route("/orders/:id/delivery", get(deliveries::get_delivery))
        .with_permission(perm::PEDIDO_READ);

    let orders_write = Router::new()
        .route("/orders/:id/status", put(orders::set_status))
        .with_permission(perm::PEDIDO_WRITE);

    let catalog_write = Router::new()
        .route("/products", post(catalog::create_product))
        .route("/products/:id", put(catalog::update_product))
        .route("/flavors", post(catalog::create_flavor))
        .route("/flavors/:id", put(catalog::update_flavor))
        .with_permission(perm::CATALOGO_WRITE);

    let invoices_write = Router::new()
        .route("/orders/:id/invoice", post(invoices::issue_invoice))
        .with_permission(perm::FACTURA_WRITE);

    let deliveries_write = Router::new()
        .route("/orders/:id/delivery", post(deliveries::assign_delivery))
        .route(
            "/orders/:id/delivery/status",
            put(deliveries::update_delivery_status),
        )
        .with_permission(perm::ENVIO_WRITE);

    let production_routes = Router::new()
        .route("/production/queue", get(production::production_queue))
        .route("/production/orders/:id/plan", get(production::production_plan))
        .route("/production/orders/:id/start", post(production::start_production))
        .route(
            "/production/orders/:id/items/:producto_id/:sabor_id",
            post(production::produce_item),
        )
        .route("/production/orders/:id/ready", post(production::mark_ready))
        .with_permission(perm::PRODUCCION);

    let inventory_read = Router::new()
        .route("/ingredients", get(inventory::list_ingredients))
        .route("/ingredients/:id", get(inventory::get_ingredient))
        .route("/ingredients/:id/stock", get(inventory::stock_level))
        .route("/kardex", get(inventory::list_kardex))
        .route("/recipes/:producto_id", get(inventory::get_recipe))
        .with_permission(perm::INSUMO_READ);

    let inventory_write = Router::new()
        .route("/ingredients", post(inventory::create_ingredient))
        .route(
            "/ingredients/:id",
            put(inventory::update_ingredient).delete(inventory::delete_ingredient),
        )
        .route("/ingredients/:id/movements", post(inventory::record_movement))
        .route("/recipes/:producto_id", put(inventory::set_recipe))
        .with_permission(perm::INSUMO_WRITE);

    let suppliers_read = Router::new()
        .route("/suppliers", get(suppliers::list_suppliers))
        .route("/suppliers/:id", get(suppliers::get_supplier))
        .with_permission(perm::PROVEEDOR_READ);

    let suppliers_write = Router::new()
        .route("/suppliers", post(suppliers::create_supplier))
        .route(
            "/suppliers/:id",
            put(suppliers::update_supplier).delete(suppliers::delete_supplier),
        )
        .with_permission(perm::PROVEEDOR_WRITE);

    let purchases_read = Router::new()
        .route("/purchases", get(purchases::list_purchases))
        .route("/purchases/:id", get(purchases::get_purchase))
        .with_permission(perm::COMPRA_READ);

    let purchases_write = Router::new()
        .route("/purchases", post(purchases::create_purchase))
        .route("/purchases/:id/receive", post(purchases::receive_purchase))
        .with_permission(perm::COMPRA_WRITE);

    let reports_read = Router::new()
        .route("/reports/customer-history", get(reports::customer_history))
        .route("/reports/status-summary", get(reports::status_summary))
        .with_permission(perm::REPORTE_READ);

    let audit_read = Router::new()
        .route("/audit", get(audit::list_audit))
        .with_permission(perm::BITACORA_READ);

    let admin = Router::new()
        .route("/admin/permissions", get(rbac::list_permissions))
        .route("/admin/roles", get(rbac::list_roles).post(rbac::create_role))
        .route(
            "/admin/roles/:id",
            get(rbac::get_role)
                .put(rbac::update_role)
                .delete(rbac::delete_role),
        )
        .route("/admin/users", get(rbac::list_users))
        .route("/admin/users/:id/roles", put(rbac::assign_roles))
        .with_permission(perm::ROL_ADMIN);

    Router::new()
        .merge(handlers::health::health_routes())
        .merge(public)
        .merge(signed_in)
        .merge(orders_read)
        .merge(orders_write)
        .merge(catalog_write)
        .merge(invoices_write)
        .merge(deliveries_write)
        .merge(production_routes)
        .merge(inventory_read)
        .merge(inventory_write)
        .merge(suppliers_read)
        .merge(suppliers_write)
        .merge(purchases_read)
        .merge(purchases_write)
        .merge(reports_read)
        .merge(audit_read)
        .merge(admin)
}

/// Explicit origins when configured, permissive otherwise.
///
/// `config::validate_config` rejects non-development setups that have neither.
pub fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// The complete HTTP application: health checks, `/api/v1`, Swagger UI and the shared layers
pub fn app_router(state: AppState) -> Router {
    let auth_service = state.auth.clone();
    let cors = cors_layer(&state.config);

    Router::<AppState>::new()
        .route("/", get(handlers::health::liveness))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // auth_middleware reads the service from request extensions
        .layer(Extension(auth_service))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
